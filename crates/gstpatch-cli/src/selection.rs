use anyhow::{anyhow, Result};
use gstpatch_core::Installation;

/// Which of the listed installations to act on. Indices are 1-based, as shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    None,
    Indices(Vec<usize>),
}

pub(crate) fn parse_selection(input: &str) -> Result<Selection> {
    let trimmed = input.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => return Err(anyhow!("empty selection")),
        "a" | "all" => return Ok(Selection::All),
        "n" | "none" | "q" | "quit" => return Ok(Selection::None),
        _ => {}
    }

    let mut indices = Vec::new();
    for part in trimmed
        .split([',', ' '])
        .map(str::trim)
        .filter(|part| !part.is_empty())
    {
        let index: usize = part
            .parse()
            .map_err(|_| anyhow!("invalid selection '{part}': expected a number, 'all' or 'none'"))?;
        if index == 0 {
            return Err(anyhow!("invalid selection '0': numbering starts at 1"));
        }
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    Ok(Selection::Indices(indices))
}

/// Resolves a selection against the discovered list without any terminal I/O.
pub(crate) fn select_targets(
    installations: &[Installation],
    selection: &Selection,
) -> Result<Vec<Installation>> {
    match selection {
        Selection::All => Ok(installations.to_vec()),
        Selection::None => Ok(Vec::new()),
        Selection::Indices(indices) => indices
            .iter()
            .map(|index| {
                installations
                    .get(index.wrapping_sub(1))
                    .cloned()
                    .ok_or_else(|| {
                        anyhow!(
                            "selection {index} is out of range (1-{})",
                            installations.len()
                        )
                    })
            })
            .collect(),
    }
}
