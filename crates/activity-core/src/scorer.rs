//! Scorer (spec §4.C): integer XP for one message given rolling context.

use crate::fingerprint::hamming_distance;
use chrono::{DateTime, Utc};

const LENGTH_B: f64 = 4.0;
const LENGTH_K: f64 = 0.025;
const SIM_DUP_WINDOW_SECS: i64 = 60;
const SIM_MIN_NORMALIZED_LEN: i32 = 12;
const SIM_HIGH_THRESHOLD: f64 = 0.92;
const SIM_MID_THRESHOLD: f64 = 0.85;
const SPEED_MIN_LENGTH: i32 = 50;
const SPEED_WPM_HARD_CAP: f64 = 300.0;
const SPEED_WPM_SOFT_CAP: f64 = 200.0;

/// The author's previous non-bot message in this guild (spec §4.D `PrevUser`).
#[derive(Debug, Clone)]
pub struct PrevUser {
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
}

/// One entry of the author's recent-simhash window (spec §4.D `RecentSimhashes`).
#[derive(Debug, Clone, Copy)]
pub struct RecentEntry {
    pub simhash: u64,
    pub normalized_length: i32,
}

/// The guild's rolling length statistics prior to this message (spec §4.D `GuildStats`).
#[derive(Debug, Clone, Copy)]
pub struct PrevGuild {
    pub avg_len: f64,
}

/// Everything the scorer needs about one message and its context.
pub struct ScoreInput<'a> {
    pub length: i32,
    pub normalized_length: i32,
    pub simhash: u64,
    pub content_hash: &'a str,
    pub timestamp: DateTime<Utc>,
    pub prev_user: Option<&'a PrevUser>,
    pub recent: &'a [RecentEntry],
    pub prev_guild: Option<PrevGuild>,
}

/// Compute integer XP for one message (spec §4.C). May return 0, never negative.
pub fn score(input: &ScoreInput) -> i32 {
    let base = 1.0_f64;
    let length_xp = length_xp(input.length, input.prev_guild);
    let sim_simple = sim_simple(input.prev_user, input.content_hash, input.timestamp);
    let speed_simple = speed_simple(input.prev_user, input.timestamp);
    let sim_complex = sim_complex(input.normalized_length, input.simhash, input.recent);
    let speed_complex = speed_complex(input.prev_user, input.timestamp, input.length);

    let xp = (base + length_xp) * sim_simple * sim_complex * speed_simple * speed_complex;
    xp.floor() as i32
}

fn length_xp(length: i32, prev_guild: Option<PrevGuild>) -> f64 {
    let r = match prev_guild {
        Some(g) if g.avg_len > 0.0 => (length as f64 / g.avg_len).clamp(0.0, 100.0),
        _ => 1.0,
    };
    LENGTH_B * (1.0 + LENGTH_K * r).ln() / (1.0 + LENGTH_K).ln()
}

fn sim_simple(prev_user: Option<&PrevUser>, content_hash: &str, t: DateTime<Utc>) -> f64 {
    match prev_user {
        Some(prev)
            if prev.content_hash == content_hash
                && within_duplicate_window(t, prev.timestamp) =>
        {
            0.0
        }
        _ => 1.0,
    }
}

fn speed_simple(prev_user: Option<&PrevUser>, t: DateTime<Utc>) -> f64 {
    match prev_user {
        None => 1.0,
        Some(prev) => {
            let dt = (t - prev.timestamp).num_milliseconds() as f64 / 1000.0;
            let dt = dt.clamp(0.0, 5.0);
            (1.0 + 9.0 * dt).ln() / (1.0 + 9.0 * 5.0).ln()
        }
    }
}

fn sim_complex(normalized_length: i32, simhash: u64, recent: &[RecentEntry]) -> f64 {
    if normalized_length < SIM_MIN_NORMALIZED_LEN || simhash == 0 {
        return 1.0;
    }
    let s_max = recent
        .iter()
        .filter(|e| e.simhash != 0 && e.normalized_length >= SIM_MIN_NORMALIZED_LEN)
        .map(|e| 1.0 - hamming_distance(simhash, e.simhash) as f64 / 64.0)
        .fold(f64::NEG_INFINITY, f64::max);

    if s_max >= SIM_HIGH_THRESHOLD {
        0.0
    } else if s_max >= SIM_MID_THRESHOLD {
        0.25
    } else {
        1.0
    }
}

fn speed_complex(prev_user: Option<&PrevUser>, t: DateTime<Utc>, length: i32) -> f64 {
    let prev = match prev_user {
        Some(p) => p,
        None => return 1.0,
    };
    if length < SPEED_MIN_LENGTH {
        return 1.0;
    }
    let dt_secs = (t - prev.timestamp).num_milliseconds() as f64 / 1000.0;
    let dt_min = (dt_secs / 60.0).max(1e-6);
    let wpm = (length as f64 / dt_min) / 5.0;
    if wpm >= SPEED_WPM_HARD_CAP {
        0.0
    } else if wpm > SPEED_WPM_SOFT_CAP {
        1.0 - (1.0 + 9.0 * (wpm - SPEED_WPM_SOFT_CAP) / 100.0).log10()
    } else {
        1.0
    }
}

/// Whether two timestamps are within the duplicate-suppression window
/// (spec §4.C `sim_simple`).
pub fn within_duplicate_window(t: DateTime<Utc>, t_prev: DateTime<Utc>) -> bool {
    (t - t_prev).num_seconds().abs() < SIM_DUP_WINDOW_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn scenario_1_hello_world_first_message() {
        let input = ScoreInput {
            length: 11,
            normalized_length: 11,
            simhash: 0,
            content_hash: "h1",
            timestamp: ts(0),
            prev_user: None,
            recent: &[],
            prev_guild: None,
        };
        assert_eq!(score(&input), 5);
    }

    #[test]
    fn scenario_2_duplicate_within_window_is_zero() {
        let prev = PrevUser {
            timestamp: ts(0),
            content_hash: "same".to_string(),
        };
        let input = ScoreInput {
            length: 5,
            normalized_length: 5,
            simhash: 0,
            content_hash: "same",
            timestamp: ts(30),
            prev_user: Some(&prev),
            recent: &[],
            prev_guild: Some(PrevGuild { avg_len: 5.0 }),
        };
        assert_eq!(score(&input), 0);
    }

    #[test]
    fn scenario_4_high_wpm_zeroes_xp() {
        // 100-char message sent 0.2s after a 100-char message -> wpm=6000.
        let prev = PrevUser {
            timestamp: ts(0) - chrono::Duration::milliseconds(200),
            content_hash: "other".to_string(),
        };
        let input = ScoreInput {
            length: 100,
            normalized_length: 100,
            simhash: 12345,
            content_hash: "this",
            timestamp: ts(0),
            prev_user: Some(&prev),
            recent: &[],
            prev_guild: None,
        };
        assert_eq!(score(&input), 0);
    }

    #[test]
    fn no_prev_context_gives_full_speed_multiplier() {
        assert_eq!(speed_simple(None, ts(0)), 1.0);
        assert_eq!(speed_complex(None, ts(0), 1000), 1.0);
    }

    #[test]
    fn xp_never_negative() {
        let prev = PrevUser {
            timestamp: ts(0),
            content_hash: "other".to_string(),
        };
        let input = ScoreInput {
            length: 1000,
            normalized_length: 1000,
            simhash: u64::MAX,
            content_hash: "this",
            timestamp: ts(1),
            prev_user: Some(&prev),
            recent: &[RecentEntry {
                simhash: u64::MAX,
                normalized_length: 1000,
            }],
            prev_guild: Some(PrevGuild { avg_len: 10.0 }),
        };
        assert!(score(&input) >= 0);
    }

    #[test]
    fn length_monotone_without_penalties() {
        let mut prev_xp = 0;
        for len in (1..2000).step_by(50) {
            let input = ScoreInput {
                length: len,
                normalized_length: 0, // below sim_complex threshold, stays neutral
                simhash: 0,
                content_hash: "x",
                timestamp: ts(1000),
                prev_user: None,
                recent: &[],
                prev_guild: Some(PrevGuild { avg_len: 50.0 }),
            };
            let xp = score(&input);
            assert!(xp >= prev_xp, "xp decreased at len={len}: {xp} < {prev_xp}");
            prev_xp = xp;
        }
    }
}
