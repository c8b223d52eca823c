use crate::handlers::HandlerRegistry;
use std::collections::HashMap;

/// Expands `{{< name args >}}` tags (and their `{{< /name >}}` block form)
/// into HTML fragments. Every fault is non-fatal: unknown tags pass through
/// verbatim, bad arguments degrade to empty argument lists, and handler
/// errors become HTML comments.
pub struct ShortcodeExpander {
    registry: HandlerRegistry,
}

impl ShortcodeExpander {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Single substitution pass over all top-level tags. Inner text of a
    /// block tag is expanded recursively before its handler runs; handler
    /// output is never rescanned.
    pub fn expand(&self, content: &str) -> String {
        let mut output = String::with_capacity(content.len());
        let mut remaining = content;

        while let Some(start) = remaining.find("{{<") {
            output.push_str(&remaining[..start]);
            let rest = &remaining[start..];

            match self.expand_at(rest) {
                Some((rendered, consumed)) => {
                    output.push_str(&rendered);
                    remaining = &rest[consumed..];
                }
                None => {
                    // Not a well-formed opener; the marker is literal text.
                    output.push_str("{{<");
                    remaining = &rest[3..];
                }
            }
        }

        output.push_str(remaining);
        output
    }

    /// Expands the tag starting at the head of `input` (which begins with
    /// `{{<`), returning the replacement text and the number of input bytes
    /// consumed. `None` means the marker did not parse as a tag.
    fn expand_at(&self, input: &str) -> Option<(String, usize)> {
        let after_open = &input[3..];

        let name_start = leading_whitespace(after_open);
        let name_len = name_length(&after_open[name_start..]);
        if name_len == 0 {
            return None;
        }
        let name_end = name_start + name_len;
        let name = &after_open[name_start..name_end];

        let close_position = after_open.find(">}}")?;
        if close_position < name_end {
            return None;
        }

        let args_text = after_open[name_end..close_position].trim();
        let opener_len = 3 + close_position + 3;
        let after_opener = &input[opener_len..];

        // Block form when a matching closer exists anywhere later; the first
        // closer wins, so nesting a tag inside a block of the same name is
        // unsupported.
        let closer = find_closing_tag(after_opener, name);

        let consumed = match closer {
            Some((_, closer_end)) => opener_len + closer_end,
            None => opener_len,
        };

        let Some(handler) = self.registry.lookup(name) else {
            eprintln!("Warning: shortcode '{}' not found", name);
            return Some((input[..consumed].to_string(), consumed));
        };

        let (positional, mut named) = match parse_args(args_text) {
            Ok(parsed) => parsed,
            Err(message) => {
                eprintln!(
                    "Warning: error parsing arguments for shortcode '{}': {}",
                    name, message
                );
                (Vec::new(), HashMap::new())
            }
        };

        if let Some((inner_end, _)) = closer {
            let inner = &after_opener[..inner_end];
            named.insert("content".to_string(), self.expand(inner));
        }

        let rendered = match handler(&positional, &named) {
            Ok(html) => html,
            Err(message) => {
                eprintln!("Warning: error rendering shortcode '{}': {}", name, message);
                format!("<!-- Error rendering {}: {} -->", name, message)
            }
        };

        Some((rendered, consumed))
    }
}

/// Splits the text between a tag's name and its `>}}` into positional and
/// named arguments. Tokens follow shell-style word splitting; a token
/// containing `=` is split on the first `=` into a named argument.
pub fn parse_args(input: &str) -> Result<(Vec<String>, HashMap<String, String>), String> {
    let tokens = split_words(input)?;

    let mut positional = Vec::new();
    let mut named = HashMap::new();

    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => {
                named.insert(key.to_string(), value.to_string());
            }
            None => positional.push(token),
        }
    }

    Ok((positional, named))
}

#[derive(PartialEq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Shell-style word splitting: whitespace separates words, single and double
/// quotes group and are stripped, backslash escapes the next character
/// outside quotes and the quote/backslash characters inside double quotes.
fn split_words(input: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = input.chars().peekable();

    while let Some(character) = chars.next() {
        match quote {
            Quote::None => match character {
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => match chars.next() {
                    Some(escaped) => {
                        current.push(escaped);
                        in_word = true;
                    }
                    None => return Err("no character after escape".to_string()),
                },
                other => {
                    current.push(other);
                    in_word = true;
                }
            },
            Quote::Single => match character {
                '\'' => quote = Quote::None,
                other => current.push(other),
            },
            Quote::Double => match character {
                '"' => quote = Quote::None,
                '\\' => {
                    if let Some(&escaped) = chars.peek()
                        && (escaped == '"' || escaped == '\\')
                    {
                        chars.next();
                        current.push(escaped);
                    } else {
                        current.push('\\');
                    }
                }
                other => current.push(other),
            },
        }
    }

    if quote != Quote::None {
        return Err("unbalanced quote".to_string());
    }

    if in_word {
        words.push(current);
    }

    Ok(words)
}

/// Finds the first `{{< /name >}}` closer, returning (start of the closer,
/// end of the closer) relative to `content`. Name equality is an explicit
/// comparison, so a closer for a different tag never terminates this block.
fn find_closing_tag(content: &str, name: &str) -> Option<(usize, usize)> {
    let mut search_from = 0;

    while let Some(position) = content[search_from..].find("{{<") {
        let absolute = search_from + position;
        if let Some(length) = match_closer(&content[absolute..], name) {
            return Some((absolute, absolute + length));
        }
        search_from = absolute + 3;
    }

    None
}

/// Matches `{{<` ws `/` name ws `>}}` at the head of `slice`, returning the
/// matched length.
fn match_closer(slice: &str, name: &str) -> Option<usize> {
    let rest = &slice[3..];
    let ws_before = leading_whitespace(rest);
    let rest = &rest[ws_before..];

    let rest = rest.strip_prefix('/')?;
    let rest = rest.strip_prefix(name)?;

    // The closer name must end here, not merely share a prefix.
    if name_length(rest) > 0 {
        return None;
    }

    let ws_after = leading_whitespace(rest);
    let rest = &rest[ws_after..];
    if !rest.starts_with(">}}") {
        return None;
    }

    Some(3 + ws_before + 1 + name.len() + ws_after + 3)
}

fn leading_whitespace(input: &str) -> usize {
    input.len() - input.trim_start().len()
}

fn name_length(input: &str) -> usize {
    input
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(input.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerRegistry;

    fn expander() -> ShortcodeExpander {
        ShortcodeExpander::new(HandlerRegistry::builtin())
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(expander().expand("just plain text"), "just plain text");
    }

    #[test]
    fn test_inline_tag() {
        let output = expander().expand("before {{< youtube id=\"abc\" >}} after");
        assert!(output.starts_with("before "));
        assert!(output.ends_with(" after"));
        assert!(output.contains("embed/abc"));
    }

    #[test]
    fn test_multiple_tags_one_pass() {
        let output = expander().expand("{{< youtube a1 >}} and {{< youtube a2 >}}");
        assert!(output.contains("embed/a1"));
        assert!(output.contains("embed/a2"));
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let input = "{{< nope a b >}}";
        assert_eq!(expander().expand(input), input);
    }

    #[test]
    fn test_unknown_block_passes_through_unexpanded() {
        let input = "{{< nope >}}{{< rating 9 >}}{{< /nope >}}";
        assert_eq!(expander().expand(input), input);
    }

    #[test]
    fn test_block_tag_binds_content() {
        let output = expander().expand("{{< spoiler \"Ending\" >}}they win{{< /spoiler >}}");
        assert!(output.contains("<summary>Ending</summary>"));
        assert!(output.contains("they win"));
    }

    #[test]
    fn test_nested_tag_expanded_before_outer_handler() {
        let output =
            expander().expand("{{< spoiler \"T\" >}}{{< rating 9 >}}{{< /spoiler >}}");
        assert!(output.contains("<details"));
        assert!(output.contains("★★★★⯨"));
        assert!(!output.contains("{{<"));
    }

    #[test]
    fn test_implicit_content_overrides_explicit() {
        let output =
            expander().expand("{{< spoiler title=\"T\" content=\"bogus\" >}}real{{< /spoiler >}}");
        assert!(output.contains("real"));
        assert!(!output.contains("bogus"));
    }

    #[test]
    fn test_same_name_nesting_first_closer_wins() {
        let input = "{{< spoiler \"a\" >}}x{{< spoiler \"b\" >}}y{{< /spoiler >}}z{{< /spoiler >}}";
        let output = expander().expand(input);
        // The outer block ends at the first closer; the trailing closer is
        // left behind as literal text.
        assert!(output.contains("z{{< /spoiler >}}"));
    }

    #[test]
    fn test_closer_name_is_case_sensitive() {
        let output = expander().expand("{{< spoiler >}}x{{< /Spoiler >}}");
        assert!(output.contains("{{< /Spoiler >}}"));
    }

    #[test]
    fn test_block_spans_newlines() {
        let output = expander().expand("{{< spoiler \"T\" >}}\nline one\nline two\n{{< /spoiler >}}");
        assert!(output.contains("line one\nline two"));
        assert!(output.contains("</details>"));
    }

    #[test]
    fn test_handler_error_becomes_comment() {
        let output = expander().expand("{{< rating abc >}}");
        assert_eq!(
            output,
            "<!-- Error rendering rating: invalid rating: abc/10 -->"
        );
    }

    #[test]
    fn test_unbalanced_quote_degrades_to_empty_args() {
        // Tokenizing fails, the tag is still dispatched with no arguments,
        // and the handler's missing-id error lands in a comment.
        let output = expander().expand("{{< youtube \"abc >}}");
        assert!(output.contains("<!-- Error rendering youtube"));
    }

    #[test]
    fn test_unterminated_opener_is_literal() {
        let input = "{{< youtube id=\"abc\"";
        assert_eq!(expander().expand(input), input);
    }

    #[test]
    fn test_stray_closer_is_literal() {
        let input = "text {{< /spoiler >}} more";
        assert_eq!(expander().expand(input), input);
    }

    #[test]
    fn test_expand_is_idempotent_without_markers() {
        let expander = expander();
        let once = expander.expand("a {{< youtube vid >}} b {{< rating 8 >}} c");
        assert!(!once.contains("{{<"));
        assert_eq!(expander.expand(&once), once);
    }

    #[test]
    fn test_parse_args_positional_and_named() {
        let (positional, named) = parse_args("arg1 \"arg two\" key=\"value\"").unwrap();
        assert_eq!(positional, vec!["arg1", "arg two"]);
        assert_eq!(named.get("key").unwrap(), "value");
    }

    #[test]
    fn test_parse_args_splits_on_first_equals() {
        let (_, named) = parse_args("key=a=b").unwrap();
        assert_eq!(named.get("key").unwrap(), "a=b");
    }

    #[test]
    fn test_split_words_quotes() {
        assert_eq!(
            split_words("one \"two three\" 'four five'").unwrap(),
            vec!["one", "two three", "four five"]
        );
    }

    #[test]
    fn test_split_words_escaped_quote_in_double() {
        assert_eq!(
            split_words(r#""say \"hi\"""#).unwrap(),
            vec![r#"say "hi""#]
        );
    }

    #[test]
    fn test_split_words_backslash_literal_in_double() {
        assert_eq!(split_words(r#""a\b""#).unwrap(), vec![r"a\b"]);
    }

    #[test]
    fn test_split_words_single_quotes_literal() {
        assert_eq!(split_words(r"'a\b'").unwrap(), vec![r"a\b"]);
    }

    #[test]
    fn test_split_words_adjacent_quoted_segments_join() {
        assert_eq!(split_words(r#"key="va"'lue'"#).unwrap(), vec!["key=value"]);
    }

    #[test]
    fn test_split_words_unbalanced_quote_errors() {
        assert!(split_words("\"unclosed").is_err());
        assert!(split_words("'unclosed").is_err());
    }

    #[test]
    fn test_split_words_trailing_escape_errors() {
        assert!(split_words("abc\\").is_err());
    }

    #[test]
    fn test_find_closing_tag_skips_other_names() {
        let content = "inner {{< /other >}} more {{< /spoiler >}} tail";
        let (start, end) = find_closing_tag(content, "spoiler").unwrap();
        assert_eq!(&content[start..end], "{{< /spoiler >}}");
    }

    #[test]
    fn test_match_closer_rejects_prefix_names() {
        assert!(match_closer("{{< /spoilers >}}", "spoiler").is_none());
        assert!(match_closer("{{< /spoiler >}}", "spoiler").is_some());
        assert!(match_closer("{{</spoiler>}}", "spoiler").is_some());
    }
}
