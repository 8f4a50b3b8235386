//! Line-level diff between two text blobs, used by the version service's
//! `Diff` operation (spec §4.6). Pure and synchronous: no I/O, no clock.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub content: String,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
}

/// Splits on `\n`, treating the empty string as zero lines rather than one
/// empty line — otherwise an empty document would always contribute a
/// spurious added/removed blank-line entry to every diff against it.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

/// Splits both texts into lines, builds the full LCS table, then backtracks
/// it into an ordered edit script. On a mismatch the backtrack prefers the
/// "added" (column-advance) branch whenever `dp[i][j-1] >= dp[i-1][j]`,
/// matching the tie-break spec.md calls out explicitly — without it the
/// script is still a valid diff, just not the same one on inputs with
/// multiple longest common subsequences.
pub fn diff_lines(from: &str, to: &str) -> Vec<DiffLine> {
    let a = split_lines(from);
    let b = split_lines(to);
    let n = a.len();
    let m = b.len();

    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(DiffLine {
                kind: DiffKind::Unchanged,
                content: a[i].to_string(),
                old_line: Some(i + 1),
                new_line: Some(j + 1),
            });
            i += 1;
            j += 1;
        } else if dp[i][j + 1] >= dp[i + 1][j] {
            out.push(DiffLine {
                kind: DiffKind::Added,
                content: b[j].to_string(),
                old_line: None,
                new_line: Some(j + 1),
            });
            j += 1;
        } else {
            out.push(DiffLine {
                kind: DiffKind::Removed,
                content: a[i].to_string(),
                old_line: Some(i + 1),
                new_line: None,
            });
            i += 1;
        }
    }
    while j < m {
        out.push(DiffLine {
            kind: DiffKind::Added,
            content: b[j].to_string(),
            old_line: None,
            new_line: Some(j + 1),
        });
        j += 1;
    }
    while i < n {
        out.push(DiffLine {
            kind: DiffKind::Removed,
            content: a[i].to_string(),
            old_line: Some(i + 1),
            new_line: None,
        });
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_are_all_unchanged() {
        let d = diff_lines("a\nb\nc", "a\nb\nc");
        assert!(d.iter().all(|l| l.kind == DiffKind::Unchanged));
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn pure_insertion_is_all_added() {
        let d = diff_lines("", "x\ny");
        assert_eq!(d.len(), 2);
        assert!(d.iter().all(|l| l.kind == DiffKind::Added));
    }

    #[test]
    fn pure_deletion_is_all_removed() {
        let d = diff_lines("x\ny", "");
        assert_eq!(d.len(), 2);
        assert!(d.iter().all(|l| l.kind == DiffKind::Removed));
    }

    #[test]
    fn single_line_changed_in_the_middle() {
        // dp[1][2] == dp[2][1] here, so the tie-break rule (prefer the
        // added / column-advance branch) puts "x" before "b" is removed.
        let d = diff_lines("a\nb\nc", "a\nx\nc");
        let kinds: Vec<_> = d.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffKind::Unchanged,
                DiffKind::Added,
                DiffKind::Removed,
                DiffKind::Unchanged,
            ]
        );
    }

    #[test]
    fn applying_the_script_reconstructs_the_target() {
        let from = "one\ntwo\nthree\nfour";
        let to = "one\ntwo-b\nthree\nfive";
        let script = diff_lines(from, to);
        let reconstructed: Vec<&str> = script
            .iter()
            .filter(|l| l.kind != DiffKind::Removed)
            .map(|l| l.content.as_str())
            .collect();
        assert_eq!(reconstructed.join("\n"), to);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let d = diff_lines("a", "a");
        assert_eq!(d[0].old_line, Some(1));
        assert_eq!(d[0].new_line, Some(1));
    }
}
