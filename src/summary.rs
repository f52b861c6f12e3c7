//! Text PnL report over the persisted equity history.

use crate::model::plan::Plan;
use crate::state::PersistedState;

const DAY_SECS: i64 = 24 * 3600;

/// Last point at or before `cutoff`, regardless of input order.
pub fn closest_before(points: &[(i64, f64)], cutoff: i64) -> Option<(i64, f64)> {
    points
        .iter()
        .filter(|(ts, _)| *ts <= cutoff)
        .max_by_key(|(ts, _)| *ts)
        .copied()
}

/// Absolute and fractional change from `from` to `now_equity`.
pub fn pnl_since(from: (i64, f64), now_equity: f64) -> (f64, f64) {
    let (_, base) = from;
    let abs_chg = now_equity - base;
    let pct = if base != 0.0 { abs_chg / base } else { f64::NAN };
    (abs_chg, pct)
}

pub fn fmt_money(x: f64) -> String {
    let sign = if x >= 0.0 { '+' } else { '-' };
    format!("{}${}", sign, group_thousands(x.abs()))
}

pub fn fmt_pct(x: f64) -> String {
    let sign = if x >= 0.0 { '+' } else { '-' };
    format!("{}{:.2}%", sign, x.abs() * 100.0)
}

fn group_thousands(x: f64) -> String {
    let s = format!("{:.2}", x);
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), "00"));
    let mut out = String::with_capacity(int.len() + int.len() / 3 + 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{}.{}", out, frac)
}

/// `Plan: BTCUSDT 45%, ETHUSDT 40% | cash ~15%`
pub fn plan_line(plan: Option<&Plan>) -> String {
    let Some(plan) = plan else {
        return "Plan: (none)".to_string();
    };
    let parts: Vec<String> = plan
        .weights
        .iter()
        .filter(|(_, w)| **w > 0.0)
        .map(|(s, w)| format!("{} {:.0}%", s, w * 100.0))
        .collect();
    let body = if parts.is_empty() {
        "(none)".to_string()
    } else {
        parts.join(", ")
    };
    format!("Plan: {} | cash ~{:.0}%", body, plan.cash() * 100.0)
}

fn window_line(label: &str, point: Option<(i64, f64)>, now_equity: f64) -> String {
    match point {
        Some(p) => {
            let (abs_chg, pct) = pnl_since(p, now_equity);
            format!("{}: {} ({})", label, fmt_money(abs_chg), fmt_pct(pct))
        }
        None => format!("{}: (insufficient data)", label),
    }
}

/// Multi-line summary as of `now_ts` (unix seconds).
pub fn build_summary(state: &PersistedState, base_ccy: &str, now_ts: i64) -> String {
    let header = format!("PnL Summary ({})", base_ccy);
    let mut hist = state.equity_history.clone();
    hist.sort_by_key(|(ts, _)| *ts);
    let Some(&(_, now_equity)) = hist.last() else {
        return format!("{}\nNo equity data yet.", header);
    };

    let lines = [
        header,
        window_line("24h", closest_before(&hist, now_ts - DAY_SECS), now_equity),
        window_line("7d ", closest_before(&hist, now_ts - 7 * DAY_SECS), now_equity),
        format!("Equity: ${}", group_thousands(now_equity)),
        plan_line(state.last_plan.as_ref()),
    ];
    lines.join("\n")
}
