use serde::Serialize;

use crate::canonical::ChannelMapping;
use crate::catalog::ElectrodeCatalog;
use crate::error::{PipelineError, Result};

/// A recording channel with a known scalp position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedChannel {
    /// Row of the channel in the recording's signal matrix
    pub index: usize,
    pub canonical: &'static str,
    pub position: [f64; 3],
}

/// Attach catalog positions to the mapped channels, in recording order.
///
/// Fails with `InsufficientChannels` when fewer than `min_channels` resolve.
pub fn resolve_positions(
    mapping: &ChannelMapping,
    catalog: &ElectrodeCatalog,
    min_channels: usize,
) -> Result<Vec<PositionedChannel>> {
    let mut resolved: Vec<PositionedChannel> = mapping
        .mapped
        .iter()
        .filter_map(|m| {
            catalog.position(m.canonical).map(|position| PositionedChannel {
                index: m.index,
                canonical: m.canonical,
                position,
            })
        })
        .collect();
    resolved.sort_by_key(|p| p.index);

    if resolved.len() < min_channels {
        log::warn!(
            "stage=position-resolver resolved {} of {} required electrodes",
            resolved.len(),
            min_channels
        );
        return Err(PipelineError::InsufficientChannels {
            found: resolved.len(),
            required: min_channels,
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolves_mapped_channels_only() {
        let catalog = ElectrodeCatalog::standard_1020();
        let raw = labels(&["Fp1", "Trigger", "Cz", "O2"]);
        let mapping = canonicalize(&raw, &catalog);

        let positions = resolve_positions(&mapping, &catalog, 3).unwrap();
        let indices: Vec<usize> = positions.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_eq!(positions[1].canonical, "CZ");
        assert_eq!(positions[1].position, [0.0, 0.0, 0.095]);
    }

    #[test]
    fn test_insufficient_channels() {
        let catalog = ElectrodeCatalog::standard_1020();
        let mapping = canonicalize(&labels(&["Fp1", "Ch-2"]), &catalog);

        assert_eq!(
            resolve_positions(&mapping, &catalog, 3),
            Err(PipelineError::InsufficientChannels {
                found: 1,
                required: 3
            })
        );
    }
}
