use crate::domain::model::ChapterItem;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Numeric value of a chapter name: the leading decimal number ("12.5",
/// "7-end" ⇒ 7), or 0 when the name does not start with one.
pub fn chapter_number(name: &str) -> f64 {
    static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_NUMBER.get_or_init(|| {
        Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid chapter number regex")
    });

    re.find(name)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Drops repeated chapter names, keeping the first occurrence.
pub fn dedupe(chapters: &[ChapterItem]) -> Vec<ChapterItem> {
    let mut seen = HashSet::new();
    chapters
        .iter()
        .filter(|c| seen.insert(c.chapter_name.clone()))
        .cloned()
        .collect()
}

pub fn sorted(chapters: &[ChapterItem], order: SortOrder) -> Vec<ChapterItem> {
    let mut sorted = chapters.to_vec();
    sorted.sort_by(|a, b| {
        let ord = chapter_number(&a.chapter_name).total_cmp(&chapter_number(&b.chapter_name));
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
    sorted
}

/// Chapter with the highest number; the earliest one wins a tie.
pub fn newest(chapters: &[ChapterItem]) -> Option<&ChapterItem> {
    chapters.iter().fold(None, |best: Option<&ChapterItem>, c| match best {
        Some(b) if chapter_number(&c.chapter_name) <= chapter_number(&b.chapter_name) => Some(b),
        _ => Some(c),
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbours {
    pub prev: Option<ChapterItem>,
    pub next: Option<ChapterItem>,
}

/// Previous (lower numbered) and next (higher numbered) chapters around
/// `current`.
pub fn neighbours(chapters: &[ChapterItem], current: &str) -> Neighbours {
    let ascending = sorted(chapters, SortOrder::Ascending);
    let current_number = chapter_number(current);

    match ascending
        .iter()
        .position(|c| chapter_number(&c.chapter_name) == current_number)
    {
        Some(index) => Neighbours {
            prev: index.checked_sub(1).map(|i| ascending[i].clone()),
            next: ascending.get(index + 1).cloned(),
        },
        None => Neighbours::default(),
    }
}

/// Case-insensitive match on chapter name or title.
pub fn filter<'a>(chapters: &'a [ChapterItem], query: &str) -> Vec<&'a ChapterItem> {
    let needle = query.to_lowercase();
    chapters
        .iter()
        .filter(|c| {
            needle.is_empty()
                || c.chapter_name.to_lowercase().contains(&needle)
                || c.chapter_title.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Number of list pages; a missing or zero page size means a single page.
pub fn total_pages(total_items: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 1;
    }
    total_items.div_ceil(per_page).max(1)
}
