use crate::content::ContentItem;
use serde::Serialize;

const WINDOW_RADIUS: usize = 2;
const FULL_WINDOW: usize = 7;
pub const RELATED_LIMIT: usize = 3;

/// Number of pages needed for `item_count` items, never less than one: an
/// empty stream still renders a single index page. A zero page size is
/// treated as one item per page.
pub fn total_pages(item_count: usize, per_page: usize) -> usize {
    if item_count == 0 {
        1
    } else {
        item_count.div_ceil(per_page.max(1))
    }
}

/// The page numbers shown in a pagination control. Up to seven pages are all
/// shown; beyond that the window is the first page, the last page, and two
/// pages either side of the current one, with `None` marking each elided gap.
pub fn page_window(total: usize, current: usize) -> Vec<Option<usize>> {
    if total <= FULL_WINDOW {
        return (1..=total).map(Some).collect();
    }

    let low = current.saturating_sub(WINDOW_RADIUS).max(1);
    let high = (current + WINDOW_RADIUS).min(total);

    let mut numbers: Vec<usize> = vec![1, total];
    numbers.extend(low..=high);
    numbers.sort_unstable();
    numbers.dedup();

    let mut window = Vec::with_capacity(numbers.len() + 2);
    let mut previous = 0;
    for number in numbers {
        if previous != 0 && number > previous + 1 {
            window.push(None);
        }
        window.push(Some(number));
        previous = number;
    }

    window
}

/// One slot in the rendered pagination control; `number: None` is a gap.
#[derive(Debug, Clone, Serialize)]
pub struct PageEntry {
    pub number: Option<usize>,
    pub url: Option<String>,
    pub current: bool,
}

/// Pagination context handed to templates for one page of a stream.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub pages: Vec<PageEntry>,
}

impl Pagination {
    /// Builds the context for `current` of `total` pages rooted at
    /// `base_url` (e.g. `/` for the home stream). Page one lives at the base
    /// itself, later pages under `page/<n>/`.
    pub fn build(base_url: &str, total: usize, current: usize) -> Self {
        let pages = page_window(total, current)
            .into_iter()
            .map(|number| PageEntry {
                number,
                url: number.map(|n| page_url(base_url, n)),
                current: number == Some(current),
            })
            .collect();

        Self {
            current_page: current,
            total_pages: total,
            has_prev: current > 1,
            has_next: current < total,
            prev_url: (current > 1).then(|| page_url(base_url, current - 1)),
            next_url: (current < total).then(|| page_url(base_url, current + 1)),
            pages,
        }
    }
}

/// Page one lives at the stream's base URL itself, later pages under
/// `page/<n>/`.
fn page_url(base_url: &str, number: usize) -> String {
    if number == 1 {
        base_url.to_string()
    } else {
        format!("{base_url}page/{number}/")
    }
}

/// Picks the items most related to `item`: at least one shared tag, ranked
/// by shared-tag count then recency. The item itself never appears.
pub fn related_items<'a>(
    item: &ContentItem,
    all: &'a [ContentItem],
    limit: usize,
) -> Vec<&'a ContentItem> {
    let mut scored: Vec<(usize, &ContentItem)> = all
        .iter()
        .filter(|candidate| candidate.url != item.url)
        .filter_map(|candidate| {
            let shared = candidate
                .tags
                .iter()
                .filter(|tag| item.tags.contains(tag))
                .count();
            (shared > 0).then_some((shared, candidate))
        })
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b.cmp(score_a).then(b.date.cmp(&a.date))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate)
        .collect()
}
