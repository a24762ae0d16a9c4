use std::ops::RangeInclusive;

pub const PAGE_SIZE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Paginator::new(PAGE_SIZE)
    }
}

/// One page worth of items plus what the page controls need.
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub number: usize,
    pub total: usize,
    /// Index of `items[0]` in the whole list.
    pub first_index: usize,
}

impl<T> Page<'_, T> {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total
    }

    /// Numbers of every page, for the numbered buttons.
    pub fn numbers(&self) -> RangeInclusive<usize> {
        1..=self.total
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Paginator {
            page_size: page_size.max(1),
        }
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }

    /// Items of the 1-based `page`; empty when the page does not exist.
    pub fn slice<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        if page == 0 {
            return &[];
        }
        let start = (page - 1).saturating_mul(self.page_size).min(items.len());
        let end = page.saturating_mul(self.page_size).min(items.len());
        &items[start..end]
    }

    pub fn page<'a, T>(&self, items: &'a [T], page: usize) -> Page<'a, T> {
        Page {
            items: self.slice(items, page),
            number: page,
            total: self.total_pages(items.len()),
            first_index: page.saturating_sub(1).saturating_mul(self.page_size),
        }
    }
}
