use anyhow::{Context, Result};
use cadence_conductor::{compute_stats, generate_plan_seeded};
use cadence_core::date::format_date;
use cadence_core::{load_config, CommitPlan, DayPlan, SimulationStats};
use std::path::Path;

/// Execute `cadence plan <config> [--json]`
pub fn execute(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let plan = generate_plan_seeded(&config)?;
    let stats = compute_stats(&plan, config.per_commit_cost_secs);

    if json {
        let out = serde_json::json!({ "stats": stats, "plan": plan });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Plan for {} ({})", config.full_name(), config.branch);
    print!("{}", render_summary(&stats));
    println!();
    print!("{}", render_chart(&plan));
    Ok(())
}

pub(crate) fn render_summary(stats: &SimulationStats) -> String {
    format!(
        "  Commits:   {}\n  Days:      {}\n  Est. time: {}\n",
        stats.total_commits,
        stats.total_days,
        stats.duration_label()
    )
}

fn glyph(count: u32) -> char {
    if count > 4 {
        '█'
    } else if count > 2 {
        '▓'
    } else {
        '░'
    }
}

fn render_day(day: &DayPlan) -> String {
    let weekday = day.date.weekday().to_string();
    let weekday = &weekday[..3];
    let bar: String = std::iter::repeat(glyph(day.count))
        .take(day.count as usize)
        .collect();
    let mut extras = String::new();
    if day.open_issue {
        extras.push_str(" [issue]");
    }
    if day.open_pull_request {
        extras.push_str(" [pr]");
    }
    format!(
        "{} {weekday} {:>3} {bar}{extras}",
        format_date(day.date),
        day.count
    )
}

/// One line per day; the bar glyph marks the intensity tier.
pub(crate) fn render_chart(plan: &CommitPlan) -> String {
    let mut out = String::new();
    for day in plan.iter() {
        out.push_str(&render_day(day));
        out.push('\n');
    }
    out
}
