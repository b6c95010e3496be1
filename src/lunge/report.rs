use std::fmt;

use super::session::SessionReport;

pub const NOT_RECORDED: &str = "No exercise session recorded yet.";

/// Everything the summary needs besides the accumulators.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub exercise: &'a str,
    pub fps: u32,
    pub reps: u32,
    pub target_reps: u32,
}

/// 最頻エラーのラベルから改善アドバイスを1行作る
pub fn coaching_tip(label: &str) -> String {
    let lower = label.to_lowercase();
    if lower.contains("knee") {
        "Work on proper knee alignment and depth".to_string()
    } else if lower.contains("torso") {
        "Practice maintaining an upright torso position".to_string()
    } else if lower.contains("hip") {
        "Focus on keeping hips level throughout the movement".to_string()
    } else if lower.contains("stance") {
        "Adjust your stance width for better stability".to_string()
    } else {
        format!("Practice proper form for: {}", label)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    part as f64 / whole as f64 * 100.0
}

/// Renders the human-readable session summary.
pub fn render(report: &SessionReport, ctx: &ReportContext<'_>) -> String {
    if !report.is_recording() || report.total_frames == 0 {
        return NOT_RECORDED.to_string();
    }
    Summary { report, ctx }.to_string()
}

/// 記録済みセッションの本文
struct Summary<'a> {
    report: &'a SessionReport,
    ctx: &'a ReportContext<'a>,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (report, ctx) = (self.report, self.ctx);
        let fps = f64::from(ctx.fps);
        let total = report.total_frames;

        writeln!(f, "--- {} Exercise Report ---", ctx.exercise)?;
        writeln!(f, "Total Recorded Time: {:.2} seconds", total as f64 / fps)?;
        writeln!(
            f,
            "Good Form Duration: {:.2} seconds ({:.1}%)",
            report.good_form_frames as f64 / fps,
            percent(report.good_form_frames, total)
        )?;
        writeln!(f, "Repetitions Completed: {}/{}", ctx.reps, ctx.target_reps)?;
        if ctx.reps >= ctx.target_reps {
            writeln!(f, "Goal achieved!")?;
        }

        let errors = report.sorted_errors();
        writeln!(f)?;
        writeln!(f, "Errors Detected:")?;
        if errors.is_empty() {
            writeln!(f, "  - No errors detected! Perfect form!")?;
        }
        for (label, count) in &errors {
            writeln!(
                f,
                "  - '{}': {} frames ({:.2} seconds, {:.1}%)",
                label,
                count,
                *count as f64 / fps,
                percent(*count, total)
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Areas to Focus On:")?;
        match errors.first() {
            Some((label, _)) => writeln!(f, "  - {}", coaching_tip(label))?,
            None => writeln!(f, "  - Continue with your excellent form!")?,
        }
        writeln!(f, "--------------------------------")
    }
}
