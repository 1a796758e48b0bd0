//! Per-voxel payloads and Bayesian log-odds fusion
//!
//! Occupancy is tracked in log-odds form: `L(x) = log(p(x) / (1 - p(x)))`.
//! Independent observations combine by addition, there is no numerical
//! instability near 0 or 1, and clamping bounds the confidence so the map
//! stays responsive to change.
//!
//! Classification uses hysteresis: a voxel activates when its log-odds
//! exceeds the upper threshold and deactivates when it falls below the
//! lower one; between the thresholds the flag keeps its previous state.
//!
//! ## References
//!
//! - Hornung et al., "OctoMap: An Efficient Probabilistic 3D Mapping Framework" (2013)
//! - Moravec & Elfes, "High Resolution Maps from Wide Angle Sonar" (1985)

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Clamping probabilities, fixed so the map never saturates
const P_CLAMP_MIN: f64 = 0.01;
const P_CLAMP_MAX: f64 = 0.99;

/// Convert a probability to log-odds
///
/// L = log(p / (1-p))
#[inline]
pub fn prob_to_log_odds(prob: f64) -> f32 {
    (prob.ln() - (1.0 - prob).ln()) as f32
}

/// Convert log-odds to a probability
///
/// p = 1 / (1 + exp(-L))
#[inline]
pub fn log_odds_to_prob(log_odds: f32) -> f32 {
    1.0 / (1.0 + (-log_odds).exp())
}

/// Log-odds fusion parameters derived from the map configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogOdds {
    /// Increment per hit observation (positive)
    pub hit: f32,
    /// Increment per miss observation (negative)
    pub miss: f32,
    /// Deactivation threshold
    pub thres_min: f32,
    /// Activation threshold
    pub thres_max: f32,
    /// Lower clamp, `log(0.01/0.99)`
    pub clamp_min: f32,
    /// Upper clamp, `log(0.99/0.01)`
    pub clamp_max: f32,
}

impl LogOdds {
    /// Derive fusion parameters from probabilities
    pub fn from_probabilities(
        prob_hit: f64,
        prob_miss: f64,
        prob_thres_min: f64,
        prob_thres_max: f64,
    ) -> Self {
        Self {
            hit: prob_to_log_odds(prob_hit),
            miss: prob_to_log_odds(prob_miss),
            thres_min: prob_to_log_odds(prob_thres_min),
            thres_max: prob_to_log_odds(prob_thres_max),
            clamp_min: prob_to_log_odds(P_CLAMP_MIN),
            clamp_max: prob_to_log_odds(P_CLAMP_MAX),
        }
    }
}

/// Ancillary data carried alongside a hit observation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HitAttributes {
    /// Observed color channels; scale is irrelevant, fusion normalizes by sum
    pub color: Option<[f32; 3]>,
    /// Observed semantic label
    pub label: Option<i32>,
}

impl HitAttributes {
    /// True if neither channel carries data
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.label.is_none()
    }
}

/// Capability set required of a persistent-grid voxel payload
///
/// The map is monomorphized over one payload type; there is no dispatch on
/// the fusion hot path. Implementors own their log-odds scalar and apply
/// the hit/miss increments, clamping, and threshold crossings themselves,
/// writing the resulting classification through `active`.
pub trait VoxelData: Default + Clone {
    /// Integrate one hit observation, clamping and possibly activating
    fn integrate_hit(&mut self, odds: &LogOdds, active: &mut bool);

    /// Integrate one miss observation, clamping and possibly deactivating
    fn integrate_miss(&mut self, odds: &LogOdds, active: &mut bool);

    /// Fuse appearance/semantic attributes from a confident hit
    fn fuse_attributes(&mut self, _attr: &HitAttributes, _history_cap: usize) {}

    /// Current log-odds occupancy estimate
    fn log_odds(&self) -> f32;
}

/// Reference voxel payload: occupancy, running color, majority semantic label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyVoxel {
    /// Log-odds occupancy
    pub log_odds: f32,
    /// Running color estimate, normalized channels
    pub color: [f32; 3],
    /// Current majority label, -1 when unlabeled
    pub semantic: i32,
    /// Recent observed labels for majority voting
    history: VecDeque<i32>,
}

impl Default for OccupancyVoxel {
    fn default() -> Self {
        Self {
            log_odds: 0.0, // unknown (p = 0.5)
            color: [0.0; 3],
            semantic: -1,
            history: VecDeque::new(),
        }
    }
}

impl OccupancyVoxel {
    /// Occupancy probability in [0, 1]
    pub fn probability(&self) -> f32 {
        log_odds_to_prob(self.log_odds)
    }

    /// Labels currently held in the voting window, oldest first
    pub fn label_history(&self) -> impl Iterator<Item = i32> + '_ {
        self.history.iter().copied()
    }

    fn push_label(&mut self, label: i32, cap: usize) {
        if cap == 0 {
            return;
        }
        self.history.push_back(label);
        while self.history.len() > cap {
            self.history.pop_front();
        }
        self.semantic = majority_label(&self.history);
    }
}

/// Mode of the label window; ties broken by the most recent occurrence
fn majority_label(history: &VecDeque<i32>) -> i32 {
    let mut counts: FxHashMap<i32, (usize, usize)> = FxHashMap::default();
    for (pos, &label) in history.iter().enumerate() {
        let entry = counts.entry(label).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = pos;
    }
    counts
        .into_iter()
        .max_by_key(|&(_, (count, last_pos))| (count, last_pos))
        .map(|(label, _)| label)
        .unwrap_or(-1)
}

impl VoxelData for OccupancyVoxel {
    fn integrate_hit(&mut self, odds: &LogOdds, active: &mut bool) {
        self.log_odds = (self.log_odds + odds.hit).min(odds.clamp_max);
        if self.log_odds > odds.thres_max {
            *active = true;
        }
    }

    fn integrate_miss(&mut self, odds: &LogOdds, active: &mut bool) {
        self.log_odds = (self.log_odds + odds.miss).max(odds.clamp_min);
        if self.log_odds < odds.thres_min {
            *active = false;
        }
    }

    fn fuse_attributes(&mut self, attr: &HitAttributes, history_cap: usize) {
        if let Some(rgb) = attr.color {
            let sum = rgb[0] + rgb[1] + rgb[2];
            if sum > 0.0 {
                for (c, observed) in self.color.iter_mut().zip(rgb) {
                    *c = (*c + observed / sum) / 2.0;
                }
            }
        }
        if let Some(label) = attr.label {
            self.push_label(label, history_cap);
        }
    }

    fn log_odds(&self) -> f32 {
        self.log_odds
    }
}
