//! Page-turn optimized song ordering.
//!
//! The piano songbook is printed double-sided and read open, so two pages
//! are visible at a time. A song whose pages straddle a page turn forces the
//! pianist to turn mid-song. The planner orders songs into page groups that
//! never split a song:
//!
//! ```text
//! group 1  (budget 2)   the first spread is a single page pair
//! group 2  (budget 4)   every later group fills two spreads
//! group 3  (budget 4)
//! ...
//! ```
//!
//! ## Selection
//!
//! Songs are sorted into four buckets by piano page count (1–4), keeping
//! input order within a bucket. A group with budget `B` is filled greedily:
//! take the first song with `B` pages; if there is none, the first with
//! `B - 1`, and so on down to 1; then continue with the remaining budget.
//! Filling stops when no bucket has a song that fits.
//!
//! ```text
//! pages [1, 2, 3, 4]  →  [2] [4] [3, 1]
//! ```
//!
//! ## Placeholders
//!
//! Every group except the last one is padded with blank pages up to its
//! budget, so the next group starts on a fresh spread. A first group into
//! which nothing fits becomes a blank spread.

use crate::song::Song;
use std::collections::VecDeque;
use thiserror::Error;

/// Page budget of the first group.
pub const FIRST_GROUP_PAGES: usize = 2;

/// Page budget of every group after the first.
pub const GROUP_PAGES: usize = 4;

/// Largest piano page count a song may have.
pub const MAX_PIANO_PAGES: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("The song \"{title}\" ({song_id}) has {count} piano score pages; only 1 to {MAX_PIANO_PAGES} are supported")]
    UnsupportedPageCount {
        song_id: String,
        title: String,
        count: usize,
    },
}

/// What the planner needs to know about a song.
pub trait PianoPages {
    fn song_id(&self) -> &str;
    fn title(&self) -> &str;
    fn piano_page_count(&self) -> usize;
}

impl PianoPages for Song {
    fn song_id(&self) -> &str {
        &self.song_id
    }

    fn title(&self) -> &str {
        Song::title(self)
    }

    fn piano_page_count(&self) -> usize {
        Song::piano_page_count(self)
    }
}

#[derive(Debug)]
pub enum Slot<'a, T> {
    Song(&'a T),
    Placeholder,
}

/// Songs and blank pages sharing one page budget.
#[derive(Debug)]
pub struct PageGroup<'a, T> {
    pub budget: usize,
    pub slots: Vec<Slot<'a, T>>,
}

impl<'a, T: PianoPages> PageGroup<'a, T> {
    /// Pages used by songs and placeholders together.
    pub fn pages(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Song(song) => song.piano_page_count(),
                Slot::Placeholder => 1,
            })
            .sum()
    }

    pub fn songs(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Song(song) => Some(*song),
            Slot::Placeholder => None,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Placeholder))
            .count()
    }
}

/// Reject a song the planner cannot place.
pub fn validate<T: PianoPages>(song: &T) -> Result<(), LayoutError> {
    let count = song.piano_page_count();
    if count == 0 || count > MAX_PIANO_PAGES {
        return Err(LayoutError::UnsupportedPageCount {
            song_id: song.song_id().to_string(),
            title: song.title().to_string(),
            count,
        });
    }
    Ok(())
}

/// Songs bucketed by piano page count, FIFO within each bucket.
#[derive(Debug)]
pub struct CountingTree<'a, T> {
    buckets: [VecDeque<&'a T>; MAX_PIANO_PAGES],
}

impl<'a, T: PianoPages> CountingTree<'a, T> {
    pub fn new(songs: impl IntoIterator<Item = &'a T>) -> Result<Self, LayoutError> {
        let mut buckets: [VecDeque<&'a T>; MAX_PIANO_PAGES] = Default::default();
        for song in songs {
            validate(song)?;
            buckets[song.piano_page_count() - 1].push_back(song);
        }
        Ok(Self { buckets })
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Number of songs left with `pages` pages.
    pub fn count(&self, pages: usize) -> usize {
        self.bucket(pages).map_or(0, VecDeque::len)
    }

    /// Take the first remaining song with exactly `pages` pages.
    pub fn shift(&mut self, pages: usize) -> Option<&'a T> {
        pages
            .checked_sub(1)
            .and_then(|i| self.buckets.get_mut(i))
            .and_then(VecDeque::pop_front)
    }

    /// Take songs filling at most `budget` pages, largest fitting first.
    pub fn select(&mut self, budget: usize) -> Vec<&'a T> {
        let mut selected = Vec::new();
        let mut remaining = budget;
        'fill: while remaining > 0 {
            for pages in (1..=remaining.min(MAX_PIANO_PAGES)).rev() {
                if let Some(song) = self.shift(pages) {
                    selected.push(song);
                    remaining -= pages;
                    continue 'fill;
                }
            }
            break;
        }
        selected
    }

    fn bucket(&self, pages: usize) -> Option<&VecDeque<&'a T>> {
        pages.checked_sub(1).and_then(|i| self.buckets.get(i))
    }
}

/// Arrange `songs` into page groups. Every song is placed exactly once.
pub fn plan<'a, T: PianoPages>(
    songs: impl IntoIterator<Item = &'a T>,
) -> Result<Vec<PageGroup<'a, T>>, LayoutError> {
    let mut tree = CountingTree::new(songs)?;
    let mut groups = Vec::new();

    while !tree.is_empty() {
        let budget = if groups.is_empty() {
            FIRST_GROUP_PAGES
        } else {
            GROUP_PAGES
        };
        let selected = tree.select(budget);
        let used: usize = selected.iter().map(|s| s.piano_page_count()).sum();

        let mut slots: Vec<Slot<'a, T>> = selected.into_iter().map(Slot::Song).collect();
        if !tree.is_empty() {
            slots.extend(std::iter::repeat_with(|| Slot::Placeholder).take(budget - used));
        }
        groups.push(PageGroup { budget, slots });
    }
    Ok(groups)
}
