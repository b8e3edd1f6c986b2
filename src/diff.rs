//! Line-based unified diff used to compare two device configurations.
//!
//! Common leading and trailing lines are stripped before the longest common
//! subsequence is computed. The LCS itself runs in linear space, so two large
//! configurations that differ throughout stay cheap to hold in memory.

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Keep,
    Remove,
    Add,
}

#[derive(Debug, Clone, Copy)]
struct Edit<'a> {
    kind: Kind,
    line: &'a str,
}

/// Renders the differences from `old` to `new` as a unified diff.
///
/// Returns an empty string when both texts have the same lines.
///
/// # Examples
///
/// ```
/// use netdispatch::diff::unified_diff;
///
/// let diff = unified_diff("r1", "set a\nset b\n", "r2", "set a\nset c\n");
/// assert!(diff.starts_with("--- r1\n+++ r2\n"));
/// assert!(diff.contains("-set b\n+set c\n"));
/// assert!(unified_diff("r1", "set a\n", "r2", "set a\n").is_empty());
/// ```
pub fn unified_diff(old_name: &str, old: &str, new_name: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let edits = edit_script(&old_lines, &new_lines);

    if edits.iter().all(|edit| edit.kind == Kind::Keep) {
        return String::new();
    }

    let mut out = format!("--- {old_name}\n+++ {new_name}\n");
    for (start, end) in hunk_ranges(&edits) {
        render_hunk(&mut out, &edits, start, end);
    }
    out
}

fn edit_script<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Edit<'a>> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let keep = |line: &&'a str| Edit {
        kind: Kind::Keep,
        line: *line,
    };

    let mut edits: Vec<Edit<'a>> = old[..prefix].iter().map(keep).collect();
    lcs_edits(old_mid, new_mid, &mut edits);
    edits.extend(old[old.len() - suffix..].iter().map(keep));
    edits
}

/// Hirschberg's divide and conquer: the LCS is split at the middle line of
/// `old`, so only two score rows are alive at a time and memory stays linear
/// in the input.
fn lcs_edits<'a>(old: &[&'a str], new: &[&'a str], edits: &mut Vec<Edit<'a>>) {
    let add = |line: &&'a str| Edit {
        kind: Kind::Add,
        line: *line,
    };
    let remove = |line: &&'a str| Edit {
        kind: Kind::Remove,
        line: *line,
    };

    if old.is_empty() {
        edits.extend(new.iter().map(add));
        return;
    }
    if new.is_empty() {
        edits.extend(old.iter().map(remove));
        return;
    }
    if old.len() == 1 {
        match new.iter().position(|line| *line == old[0]) {
            Some(at) => {
                edits.extend(new[..at].iter().map(add));
                edits.push(Edit {
                    kind: Kind::Keep,
                    line: old[0],
                });
                edits.extend(new[at + 1..].iter().map(add));
            }
            None => {
                edits.push(remove(&old[0]));
                edits.extend(new.iter().map(add));
            }
        }
        return;
    }

    let mid = old.len() / 2;
    let forward = lcs_lengths(old[..mid].iter(), new.iter());
    let backward = lcs_lengths(old[mid..].iter().rev(), new.iter().rev());

    // First best split, so removals come before additions.
    let m = new.len();
    let mut split = 0;
    let mut best = 0;
    for j in 0..=m {
        let score = forward[j] + backward[m - j];
        if score > best {
            best = score;
            split = j;
        }
    }

    lcs_edits(&old[..mid], &new[..split], edits);
    lcs_edits(&old[mid..], &new[split..], edits);
}

/// `row[j]` is the LCS length of all of `old` and the first `j` lines of `new`.
fn lcs_lengths<'s, 'a: 's>(
    old: impl Iterator<Item = &'s &'a str>,
    new: impl Iterator<Item = &'s &'a str> + Clone,
) -> Vec<u32> {
    let len = new.clone().count();
    let mut row = vec![0u32; len + 1];
    for a in old {
        let mut diagonal = 0;
        for (j, b) in new.clone().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if a == b {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row
}

/// Groups changes closer than two context windows into shared hunks.
fn hunk_ranges(edits: &[Edit<'_>]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (index, edit) in edits.iter().enumerate() {
        if edit.kind == Kind::Keep {
            continue;
        }
        let start = index.saturating_sub(CONTEXT);
        let end = (index + CONTEXT + 1).min(edits.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

fn render_hunk(out: &mut String, edits: &[Edit<'_>], start: usize, end: usize) {
    let old_before = edits[..start].iter().filter(|e| e.kind != Kind::Add).count();
    let new_before = edits[..start].iter().filter(|e| e.kind != Kind::Remove).count();
    let hunk = &edits[start..end];
    let old_len = hunk.iter().filter(|e| e.kind != Kind::Add).count();
    let new_len = hunk.iter().filter(|e| e.kind != Kind::Remove).count();

    out.push_str(&format!(
        "@@ -{} +{} @@\n",
        hunk_span(old_before, old_len),
        hunk_span(new_before, new_len)
    ));
    for edit in hunk {
        let marker = match edit.kind {
            Kind::Keep => ' ',
            Kind::Remove => '-',
            Kind::Add => '+',
        };
        out.push(marker);
        out.push_str(edit.line);
        out.push('\n');
    }
}

fn hunk_span(before: usize, len: usize) -> String {
    match len {
        0 => format!("{before},0"),
        1 => format!("{}", before + 1),
        _ => format!("{},{}", before + 1, len),
    }
}
