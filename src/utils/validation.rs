//! Centralized validation and helper functions.

use std::path::Path;

/// Maximum number of regions accepted from user input (DOS protection)
pub const MAX_INPUT_REGIONS: usize = 1_000_000;

/// Parse a 1-based coordinate, allowing `,` and `_` as thousands separators.
///
/// # Examples
///
/// ```
/// use frag_slicer::utils::validation::parse_coordinate;
///
/// assert_eq!(parse_coordinate("1,000,000"), Some(1_000_000));
/// assert_eq!(parse_coordinate("2_500"), Some(2500));
/// assert_eq!(parse_coordinate("12a"), None);
/// assert_eq!(parse_coordinate(""), None);
/// ```
#[must_use]
pub fn parse_coordinate(s: &str) -> Option<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

/// Check if adding another region would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new region.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_region_limit(count: usize) -> Option<String> {
    if count >= MAX_INPUT_REGIONS {
        Some(format!(
            "Too many regions: adding another would exceed maximum of {MAX_INPUT_REGIONS}"
        ))
    } else {
        None
    }
}

/// Output validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Output path is the same as the input: {0}")]
    OutputIsInput(String),
    #[error("Output directory does not exist: {0}")]
    MissingOutputDirectory(String),
    #[error("No regions given: use --region and/or --regions-file")]
    NoRegions,
}

/// Ensure the output can be created without clobbering the input.
///
/// # Errors
///
/// Returns `ValidationError::OutputIsInput` if both paths resolve to the same file, or
/// `ValidationError::MissingOutputDirectory` if the output's parent directory is missing.
pub fn validate_output_path(input: &Path, output: &Path) -> Result<(), ValidationError> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(ValidationError::OutputIsInput(output.display().to_string()));
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ValidationError::MissingOutputDirectory(
                parent.display().to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_region_limit() {
        assert!(check_region_limit(0).is_none());
        assert!(check_region_limit(MAX_INPUT_REGIONS - 1).is_none());
        assert!(check_region_limit(MAX_INPUT_REGIONS).is_some());
    }

    #[test]
    fn test_validate_output_path() {
        let input = Path::new("in.bam");
        assert!(matches!(
            validate_output_path(input, Path::new("in.bam")),
            Err(ValidationError::OutputIsInput(_))
        ));
        assert!(validate_output_path(input, Path::new("out.bam")).is_ok());
        assert!(matches!(
            validate_output_path(input, Path::new("/definitely/not/a/dir/out.bam")),
            Err(ValidationError::MissingOutputDirectory(_))
        ));
    }
}
