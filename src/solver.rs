//! Section solver: evaluating filled slots and the working board for one section.
//!
//! `evaluate` is a pure function over slot state. `SectionBoard` is the mutable
//! working copy the player drags blocks around in; it never touches catalog data.

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;

use crate::domain::{Block, Section, Slot};

/// Result of checking a section. No partial credit: `correct` needs every slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub correct: bool,
    pub per_slot: BTreeMap<String, bool>,
}

impl Evaluation {
    pub fn incorrect_slots(&self) -> Vec<String> {
        self.per_slot
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

pub fn evaluate(slots: &[Slot]) -> Evaluation {
    let per_slot: BTreeMap<String, bool> = slots
        .iter()
        .map(|s| (s.id.clone(), s.holds_correct_block()))
        .collect();
    Evaluation {
        correct: per_slot.values().all(|ok| *ok),
        per_slot,
    }
}

pub fn all_filled(slots: &[Slot]) -> bool {
    slots.iter().all(|s| !s.is_empty())
}

/// Uniform Fisher-Yates shuffle.
pub fn shuffle_blocks<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Working state of the section currently being solved.
#[derive(Clone, Debug)]
pub struct SectionBoard {
    section: Section,
    available: Vec<Block>,
}

impl SectionBoard {
    /// Present a section: empty slots and a freshly shuffled pool.
    pub fn present<R: Rng + ?Sized>(section: &Section, rng: &mut R) -> Self {
        let mut board = SectionBoard {
            section: section.clone(),
            available: Vec::new(),
        };
        board.reset(rng);
        board
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn slots(&self) -> &[Slot] {
        &self.section.slots
    }

    /// Blocks not currently placed in a slot, in display order.
    pub fn available(&self) -> &[Block] {
        &self.available
    }

    pub fn all_filled(&self) -> bool {
        all_filled(&self.section.slots)
    }

    pub fn evaluate(&self) -> Evaluation {
        evaluate(&self.section.slots)
    }

    /// Put a pool block into an empty slot. Returns false (and changes nothing)
    /// when the slot is unknown or occupied, or the block is not in the pool.
    pub fn place_block(&mut self, block_id: &str, slot_id: &str) -> bool {
        let Some(slot) = self.section.slots.iter_mut().find(|s| s.id == slot_id) else {
            return false;
        };
        if !slot.is_empty() {
            return false;
        }
        let Some(pos) = self.available.iter().position(|b| b.id == block_id) else {
            return false;
        };
        self.available.remove(pos);
        slot.filled_with_block_id = Some(block_id.to_string());
        true
    }

    /// Empty a filled slot and return its block to the end of the pool.
    /// Returns the block id, or None when the slot was empty or unknown.
    pub fn clear_slot(&mut self, slot_id: &str) -> Option<String> {
        let slot = self.section.slots.iter_mut().find(|s| s.id == slot_id)?;
        let block_id = slot.filled_with_block_id.take()?;
        slot.is_incorrect = false;
        if let Some(block) = self.section.blocks.iter().find(|b| b.id == block_id) {
            self.available.push(block.clone());
        }
        Some(block_id)
    }

    /// Everything back to the initial unsolved state, pool reshuffled.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for slot in &mut self.section.slots {
            slot.filled_with_block_id = None;
            slot.is_solved = false;
            slot.is_incorrect = false;
        }
        self.available = self.section.blocks.clone();
        shuffle_blocks(&mut self.available, rng);
    }

    /// Flag filled slots whose block is wrong. Empty slots are never flagged.
    pub fn mark_incorrect(&mut self, evaluation: &Evaluation) {
        for slot in &mut self.section.slots {
            let ok = evaluation.per_slot.get(&slot.id).copied().unwrap_or(false);
            slot.is_incorrect = !ok && !slot.is_empty();
        }
    }

    pub fn mark_solved(&mut self) {
        for slot in &mut self.section.slots {
            slot.is_solved = true;
            slot.is_incorrect = false;
        }
    }

    /// Content of the block sitting in `slot`, for rendering.
    pub fn filled_block(&self, slot: &Slot) -> Option<&Block> {
        slot.filled_with_block_id
            .as_deref()
            .and_then(|id| self.section.block(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn block(id: &str, slot: &str, correct: bool) -> Block {
        Block {
            id: id.into(),
            content: format!("content of {}", id),
            is_correct: correct,
            is_decoy: !correct,
            slot_id: slot.into(),
        }
    }

    fn slot(id: &str, correct: &str) -> Slot {
        Slot {
            id: id.into(),
            correct_block_id: correct.into(),
            filled_with_block_id: None,
            is_solved: false,
            is_incorrect: false,
        }
    }

    fn two_slot_section() -> Section {
        Section {
            id: "sec".into(),
            title: "Section".into(),
            description: String::new(),
            code_template: "if (%SLOT-1%) { left = %SLOT-2%; }".into(),
            slots: vec![slot("slot-1", "block-1"), slot("slot-2", "block-4")],
            blocks: vec![
                block("block-1", "slot-1", true),
                block("block-2", "slot-1", false),
                block("block-3", "slot-1", false),
                block("block-4", "slot-2", true),
                block("block-5", "slot-2", false),
                block("block-6", "slot-2", false),
            ],
            is_visible: true,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn evaluate_requires_every_slot() {
        let mut slots = two_slot_section().slots;
        assert!(!evaluate(&slots).correct);

        slots[0].filled_with_block_id = Some("block-1".into());
        let e = evaluate(&slots);
        assert!(!e.correct);
        assert_eq!(e.per_slot["slot-1"], true);
        assert_eq!(e.per_slot["slot-2"], false);

        slots[1].filled_with_block_id = Some("block-5".into());
        assert!(!evaluate(&slots).correct);

        slots[1].filled_with_block_id = Some("block-4".into());
        assert!(evaluate(&slots).correct);
        assert!(evaluate(&slots).incorrect_slots().is_empty());
    }

    #[test]
    fn place_block_fills_slot_and_drains_pool() {
        let mut b = SectionBoard::present(&two_slot_section(), &mut rng());
        assert_eq!(b.available().len(), 6);
        assert!(!b.all_filled());

        assert!(b.place_block("block-2", "slot-1"));
        assert_eq!(b.available().len(), 5);
        assert!(b.available().iter().all(|x| x.id != "block-2"));

        // Occupied slot: silent no-op.
        assert!(!b.place_block("block-1", "slot-1"));
        assert_eq!(b.slots()[0].filled_with_block_id.as_deref(), Some("block-2"));
        // Block already used, unknown slot.
        assert!(!b.place_block("block-2", "slot-2"));
        assert!(!b.place_block("block-4", "slot-9"));
        assert_eq!(b.available().len(), 5);

        assert!(b.place_block("block-4", "slot-2"));
        assert!(b.all_filled());
    }

    #[test]
    fn clear_slot_returns_block_and_clears_flag() {
        let mut b = SectionBoard::present(&two_slot_section(), &mut rng());
        assert_eq!(b.clear_slot("slot-1"), None);

        b.place_block("block-2", "slot-1");
        b.place_block("block-4", "slot-2");
        let e = b.evaluate();
        b.mark_incorrect(&e);
        assert!(b.slots()[0].is_incorrect);
        assert!(!b.slots()[1].is_incorrect);

        assert_eq!(b.clear_slot("slot-1").as_deref(), Some("block-2"));
        assert!(!b.slots()[0].is_incorrect);
        assert!(b.slots()[0].is_empty());
        assert_eq!(b.available().last().map(|x| x.id.as_str()), Some("block-2"));
        assert!(!b.all_filled());
    }

    #[test]
    fn empty_slots_are_not_flagged_incorrect() {
        let mut b = SectionBoard::present(&two_slot_section(), &mut rng());
        b.place_block("block-3", "slot-1");
        let e = b.evaluate();
        b.mark_incorrect(&e);
        assert!(b.slots()[0].is_incorrect);
        assert!(!b.slots()[1].is_incorrect);
    }

    #[test]
    fn reset_restores_initial_state() {
        let section = two_slot_section();
        let mut r = rng();
        let mut b = SectionBoard::present(&section, &mut r);
        b.place_block("block-3", "slot-1");
        b.place_block("block-6", "slot-2");
        let e = b.evaluate();
        b.mark_incorrect(&e);

        b.reset(&mut r);
        assert!(b.slots().iter().all(|s| s.is_empty() && !s.is_incorrect && !s.is_solved));
        let mut ids: Vec<_> = b.available().iter().map(|x| x.id.clone()).collect();
        ids.sort();
        let mut want: Vec<_> = section.blocks.iter().map(|x| x.id.clone()).collect();
        want.sort();
        assert_eq!(ids, want);
    }

    #[test]
    fn shuffle_is_a_permutation_and_varies() {
        let mut r = rng();
        let original: Vec<u32> = (0..20).collect();
        let mut a = original.clone();
        let mut b = original.clone();
        shuffle_blocks(&mut a, &mut r);
        shuffle_blocks(&mut b, &mut r);
        assert_ne!(a, b);
        a.sort();
        assert_eq!(a, original);
    }

    #[test]
    fn shuffle_handles_tiny_inputs() {
        let mut r = rng();
        let mut empty: Vec<u8> = vec![];
        shuffle_blocks(&mut empty, &mut r);
        let mut one = vec![1];
        shuffle_blocks(&mut one, &mut r);
        assert_eq!(one, vec![1]);
    }

    #[test]
    fn filled_block_resolves_content() {
        let mut b = SectionBoard::present(&two_slot_section(), &mut rng());
        b.place_block("block-4", "slot-2");
        let s = b.slots()[1].clone();
        assert_eq!(b.filled_block(&s).map(|x| x.id.as_str()), Some("block-4"));
        assert!(b.filled_block(&b.slots()[0].clone()).is_none());
    }
}
