//! Verify command - assert archive reproducibility

use crate::archive::{against_hash, compare, VerifyReport};
use crate::cli::args::VerifyArgs;
use crate::error::{DocforgeError, DocforgeResult};
use console::style;
use std::path::Path;
use tokio::fs;

/// Execute the verify command
pub async fn execute(args: VerifyArgs) -> DocforgeResult<()> {
    let left = read(&args.archive).await?;

    let report = if let Some(expected) = &args.hash {
        against_hash(&left, expected)
    } else if let Some(other) = &args.other {
        let right = read(other).await?;
        compare(&left, &right)
    } else {
        // clap enforces one of the two
        return Err(DocforgeError::Internal(
            "verify needs a second archive or an expected hash".to_string(),
        ));
    };

    print_report(&report);

    if report.matches {
        Ok(())
    } else {
        Err(DocforgeError::VerifyFailed {
            detail: report
                .first_divergence
                .unwrap_or_else(|| format!("{} != {}", report.left_sha256, report.right_sha256)),
        })
    }
}

async fn read(path: &Path) -> DocforgeResult<Vec<u8>> {
    fs::read(path)
        .await
        .map_err(|e| DocforgeError::io(format!("reading {}", path.display()), e))
}

fn print_report(report: &VerifyReport) {
    println!("  left  sha256 {}", report.left_sha256);
    println!("  right sha256 {}", report.right_sha256);
    if report.matches {
        println!("{} Archives are identical", style("✓").green());
    } else {
        println!("{} Archives differ", style("✗").red());
        if let Some(divergence) = &report.first_divergence {
            println!("  first divergence: {divergence}");
        }
    }
}
