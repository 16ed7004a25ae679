use crate::types::{CategoryCount, RankedEntry, escape_markdown};

pub const OTHER_LABEL: &str = "Other languages";

/// Smallest visible share, in tenths of a percent.
const VISIBLE_TENTHS: u32 = 1;

/// Share of `count` in `total`, in tenths of a percent, rounded half away
/// from zero.
pub fn percent_tenths(count: u64, total: u64) -> u32 {
    debug_assert!(total > 0);
    let count = u128::from(count);
    let total = u128::from(total);
    let tenths = (count * 2_000 + total) / (total * 2);
    u32::try_from(tenths).unwrap_or(u32::MAX)
}

/// Ranks categories by share of the total.
///
/// Categories rounding below 0.1% are folded into one trailing
/// [`OTHER_LABEL`] entry whose share is computed from their summed bytes.
/// That entry always comes last, whatever its value. Returns `None` when the
/// totals hold no bytes at all.
pub fn build(totals: &CategoryCount) -> Option<Vec<RankedEntry>> {
    let total = totals
        .values()
        .fold(0u64, |sum, bytes| sum.saturating_add(*bytes));
    if total == 0 {
        return None;
    }

    let mut entries = Vec::with_capacity(totals.len());
    let mut overflow_bytes = 0u64;
    for (name, bytes) in totals {
        let tenths = percent_tenths(*bytes, total);
        if tenths >= VISIBLE_TENTHS {
            entries.push(RankedEntry {
                name: name.clone(),
                tenths,
            });
        } else {
            overflow_bytes += bytes;
        }
    }
    entries.sort_by(|a, b| b.tenths.cmp(&a.tenths).then_with(|| a.name.cmp(&b.name)));

    if overflow_bytes > 0 {
        entries.push(RankedEntry {
            name: OTHER_LABEL.to_string(),
            tenths: percent_tenths(overflow_bytes, total),
        });
    }
    Some(entries)
}

/// Markdown body of the language report.
pub fn render(user: &str, entries: &[RankedEntry]) -> String {
    let mut text = format!(
        "Languages in the repositories of *{}*:\n\n",
        escape_markdown(user)
    );
    for line in entries.iter().map(ToString::to_string) {
        text.push_str(&line);
        text.push('\n');
    }
    text
}
