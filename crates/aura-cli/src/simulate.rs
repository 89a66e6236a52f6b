//! Local traffic simulator.
//!
//! Generates random feedback over a fixed set of actions and subjects and
//! feeds it straight into a [`KnowledgeStore`], without a network hop. Handy
//! for seeding a snapshot or eyeballing the weighting rule.

use aura_memory::{KnowledgeStore, Scores};
use aura_types::{FeedbackEvent, Sign};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

pub const ACTIONS: [&str; 4] = ["action_1", "action_2", "action_3", "action_4"];
pub const DEVICES: [&str; 3] = ["mobile", "desktop", "tablet"];
const SUBJECTS: u32 = 10;

/// Draw one random feedback event.
pub fn random_event<R: Rng + ?Sized>(rng: &mut R) -> FeedbackEvent {
    let feedback = if rng.gen_bool(0.5) {
        Sign::POSITIVE_VALUE
    } else {
        Sign::NEGATIVE_VALUE
    };
    FeedbackEvent {
        id: format!("user_{}", rng.gen_range(0..SUBJECTS)),
        action: ACTIONS.choose(rng).copied().unwrap_or(ACTIONS[0]).to_string(),
        feedback,
        device: DEVICES.choose(rng).copied().unwrap_or(DEVICES[0]).to_string(),
    }
}

/// Apply `events` random feedback events to `store`. Returns how many were
/// applied.
pub fn run<R: Rng + ?Sized>(store: &KnowledgeStore, events: usize, rng: &mut R) -> usize {
    let mut applied = 0;
    for _ in 0..events {
        let event = random_event(rng);
        let Ok(sign) = event.sign() else { continue };
        let score = store.apply_feedback(&event.action, sign);
        info!(
            subject = %event.id,
            action = %event.action,
            device = %event.device,
            feedback = event.feedback,
            score,
            "simulated feedback"
        );
        applied += 1;
    }
    applied
}

/// Render `scores` as one `Action: '<name>', Score: <n>` line per action.
pub fn render_table(scores: &Scores) -> String {
    scores
        .iter()
        .map(|(action, score)| format!("Action: '{action}', Score: {score}\n"))
        .collect()
}
