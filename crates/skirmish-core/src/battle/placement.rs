//! Start positions for a round.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_geom::BoundingRect;

use crate::error::BattleError;
use crate::rules::{BattleRules, ROBOT_SIZE};

/// Attempts to find a free spot for one robot before giving up.
pub const MAX_PLACEMENT_ATTEMPTS: u32 = 1000;

/// Where and facing which way a robot starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPosition {
    /// Center of the robot
    pub position: DVec2,
    /// Initial heading of body, gun and radar
    pub heading: f64,
}

impl StartPosition {
    /// A start position at `(x, y)` facing `heading`.
    #[must_use]
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            position: DVec2::new(x, y),
            heading,
        }
    }

    /// Returns `true` if a robot placed here fits on the battlefield.
    #[must_use]
    pub fn fits(&self, rules: &BattleRules) -> bool {
        let half = ROBOT_SIZE / 2.0;
        let p = self.position;
        p.x >= half
            && p.y >= half
            && p.x <= rules.battlefield_width - half
            && p.y <= rules.battlefield_height - half
            && self.heading.is_finite()
    }

    fn bounds(&self) -> BoundingRect {
        BoundingRect::centered(self.position, ROBOT_SIZE, ROBOT_SIZE)
    }
}

/// Random source for a round's placement.
///
/// Every round draws from its own stream of the battle seed, so a round's
/// layout does not depend on how many rounds came before it.
fn round_rng(seed: u64, round: u32) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(u64::from(round));
    rng
}

/// Picks start positions for every robot of a round.
///
/// Fixed positions are used as given. The others are drawn at random,
/// rejecting spots whose bounding box overlaps a robot already placed.
///
/// # Errors
///
/// [`BattleError::Placement`] if no free spot turns up within
/// [`MAX_PLACEMENT_ATTEMPTS`].
pub(crate) fn place_robots(
    rules: &BattleRules,
    round: u32,
    requests: &[(&str, Option<StartPosition>)],
) -> Result<Vec<StartPosition>, BattleError> {
    let mut rng = round_rng(rules.seed, round);
    let mut placed: Vec<StartPosition> = requests.iter().filter_map(|(_, fixed)| *fixed).collect();
    let mut starts = Vec::with_capacity(requests.len());

    let (min_x, max_x) = (ROBOT_SIZE, rules.battlefield_width - ROBOT_SIZE);
    let (min_y, max_y) = (ROBOT_SIZE, rules.battlefield_height - ROBOT_SIZE);

    for (name, fixed) in requests {
        if let Some(start) = fixed {
            starts.push(*start);
            continue;
        }

        let mut found = None;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let candidate = StartPosition::new(
                rng.gen_range(min_x..=max_x),
                rng.gen_range(min_y..=max_y),
                rng.gen_range(0.0..TAU),
            );
            let bounds = candidate.bounds();
            if placed.iter().all(|other| !other.bounds().intersects(&bounds)) {
                found = Some(candidate);
                break;
            }
        }
        let start = found.ok_or_else(|| BattleError::Placement {
            name: (*name).to_owned(),
            attempts: MAX_PLACEMENT_ATTEMPTS,
        })?;
        placed.push(start);
        starts.push(start);
    }
    Ok(starts)
}
