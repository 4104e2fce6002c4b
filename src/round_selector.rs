//! Round selection: which round is played next.
//!
//! The selector keeps a deck of round ids. When the deck runs out it refreshes the catalog,
//! shuffles it uniformly, and if the new deck would open with the round that was just played
//! (and more than one round exists) that round is moved to the back. Rounds are then dealt
//! from the front.
//!
//! This gives:
//! - no immediate repeat as soon as two rounds are known, even across deck boundaries
//! - every known round played once per rotation
//! - an unpredictable order from one rotation to the next

use std::collections::VecDeque;

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tracing::{debug, info};

use crate::round_interface::RoundCatalog;

/// Deals round ids from a shuffled deck.
pub struct RoundSelector<R: Rng = StdRng> {
    deck: VecDeque<String>,
    last_played: Option<String>,
    rng: R,
}

impl RoundSelector<StdRng> {
    /// Creates a selector seeded from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl Default for RoundSelector<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RoundSelector<R> {
    /// Creates a selector drawing from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            deck: VecDeque::new(),
            last_played: None,
            rng,
        }
    }

    /// Returns the next round to play, or `None` if the catalog is empty.
    pub fn next_round<C: RoundCatalog + ?Sized>(&mut self, catalog: &C) -> Option<String> {
        if self.deck.is_empty() {
            self.refill(catalog.round_ids());
        }

        let next = self.deck.pop_front()?;
        self.last_played = Some(next.clone());
        Some(next)
    }

    /// Round ids still waiting in the current deck, in dealing order.
    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.deck.iter().map(String::as_str)
    }

    /// Most recently dealt round.
    pub fn last_played(&self) -> Option<&str> {
        self.last_played.as_deref()
    }

    fn refill(&mut self, mut ids: Vec<String>) {
        ids.sort();
        ids.dedup();
        ids.shuffle(&mut self.rng);

        if ids.len() > 1 && ids.first().map(String::as_str) == self.last_played.as_deref() {
            ids.rotate_left(1);
            debug!("deck opened with the last played round, moved it to the back");
        }

        info!(deck = ?ids, "new round deck");
        self.deck = ids.into();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use anyhow::bail;

    use super::*;
    use crate::round_interface::Round;

    struct NamesOnly(RefCell<Vec<String>>);

    impl NamesOnly {
        fn new(ids: &[&str]) -> Self {
            Self(RefCell::new(ids.iter().map(|s| s.to_string()).collect()))
        }
    }

    impl RoundCatalog for NamesOnly {
        fn round_ids(&self) -> Vec<String> {
            self.0.borrow().clone()
        }

        fn create_round(&self, id: &str) -> anyhow::Result<Box<dyn Round>> {
            bail!("{id} is not playable here")
        }
    }

    fn seeded(seed: u64) -> RoundSelector<StdRng> {
        RoundSelector::with_rng(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn never_repeats_with_two_or_more_rounds() {
        for size in 2..6 {
            let ids: Vec<String> = (0..size).map(|i| format!("round{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let catalog = NamesOnly::new(&refs);
            for seed in 0..20 {
                let mut selector = seeded(seed);
                let mut previous = selector.next_round(&catalog).unwrap();
                for _ in 0..50 {
                    let next = selector.next_round(&catalog).unwrap();
                    assert_ne!(previous, next, "size {size}, seed {seed}");
                    previous = next;
                }
            }
        }
    }

    #[test]
    fn every_round_once_per_rotation() {
        let catalog = NamesOnly::new(&["pong", "tron", "plinko", "masher", "tanks"]);
        let mut selector = seeded(7);
        for _ in 0..4 {
            let rotation: HashSet<String> =
                (0..5).map(|_| selector.next_round(&catalog).unwrap()).collect();
            assert_eq!(rotation.len(), 5);
            assert_eq!(selector.remaining().count(), 0);
        }
    }

    #[test]
    fn single_round_repeats() {
        let catalog = NamesOnly::new(&["pong"]);
        let mut selector = seeded(1);
        assert_eq!(selector.next_round(&catalog).as_deref(), Some("pong"));
        assert_eq!(selector.next_round(&catalog).as_deref(), Some("pong"));
    }

    #[test]
    fn empty_catalog() {
        let catalog = NamesOnly::new(&[]);
        let mut selector = seeded(1);
        assert_eq!(selector.next_round(&catalog), None);
        assert_eq!(selector.last_played(), None);
    }

    #[test]
    fn catalog_is_refreshed_between_decks() {
        let catalog = NamesOnly::new(&["pong", "tron"]);
        let mut selector = seeded(3);
        selector.next_round(&catalog).unwrap();
        selector.next_round(&catalog).unwrap();

        *catalog.0.borrow_mut() = vec!["galaga".to_owned()];
        assert_eq!(selector.next_round(&catalog).as_deref(), Some("galaga"));
    }

    #[test]
    fn order_differs_between_seeds() {
        let ids = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let catalog = NamesOnly::new(&ids);
        let deal = |seed| {
            let mut selector = seeded(seed);
            (0..ids.len())
                .map(|_| selector.next_round(&catalog).unwrap())
                .collect::<Vec<_>>()
        };
        let orders: HashSet<Vec<String>> = (0..10).map(deal).collect();
        assert!(orders.len() > 1);
    }
}
