//! Turns a [`SimulationConfig`] into a day-by-day [`CommitPlan`]. No I/O.

use cadence_core::date::{days_inclusive, is_weekend};
use cadence_core::synth;
use cadence_core::{CommitPlan, ConfigError, DayPlan, SimulationConfig, SimulationStats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Build the plan, drawing every random choice from `rng`.
///
/// Each calendar day of `[start_date, end_date]` gets exactly one record.
/// Counts are drawn uniformly from `[min, max]`; on Saturday and Sunday the
/// draw is multiplied by `weekend_intensity` and rounded half away from zero.
/// Issue and pull-request flags are rolled per day, independent of the count.
pub fn generate_plan<R: Rng + ?Sized>(
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<CommitPlan, ConfigError> {
    let (min, max) = config.commit_bounds()?;
    let pull_requests = config.pull_requests_enabled();

    let mut days = Vec::with_capacity(days_inclusive(config.start_date, config.end_date));
    let mut date = config.start_date;
    loop {
        let drawn = rng.gen_range(min..=max);
        let count = if is_weekend(date) {
            scale(drawn, config.weekend_intensity)
        } else {
            drawn
        };
        // Always roll both so enabling one feature doesn't reshuffle the other.
        let issue_roll = rng.gen_bool(config.issue_probability);
        let pr_roll = rng.gen_bool(config.pr_probability);

        days.push(DayPlan {
            date,
            count,
            messages: (0..count).map(|i| synth::plan_message(date, i)).collect(),
            open_issue: config.simulate_issues && issue_roll,
            open_pull_request: pull_requests && pr_roll,
        });

        if date >= config.end_date {
            break;
        }
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }
    Ok(CommitPlan::new(days))
}

/// [`generate_plan`] with `config.seed`, or OS entropy when unset.
pub fn generate_plan_seeded(config: &SimulationConfig) -> Result<CommitPlan, ConfigError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    generate_plan(config, &mut rng)
}

fn scale(drawn: u32, intensity: f64) -> u32 {
    (f64::from(drawn) * intensity).round().max(0.0) as u32
}

pub fn compute_stats(plan: &CommitPlan, per_commit_cost_secs: f64) -> SimulationStats {
    let total_commits = plan.total_commits();
    SimulationStats {
        total_commits,
        total_days: plan.len(),
        estimated_duration_secs: total_commits as f64 * per_commit_cost_secs,
    }
}
