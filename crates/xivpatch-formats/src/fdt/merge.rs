//! Glyph table merge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FdtResult, FontTable, GlyphEntry, SCALE_1K, SCALE_4K};

/// Which table wins when both define a code point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Keep the base glyph; overlay glyphs only fill gaps
    #[default]
    PreferBase,
    /// Replace the base glyph with the overlay one
    PreferOverlay,
}

/// Merge settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Conflict resolution
    pub strategy: MergeStrategy,
    /// First texture slot for overlay glyphs, if they must be moved
    pub target_slot: Option<u16>,
    /// Scale a 1K base up to a 4K overlay's coordinate space
    pub promote_low_resolution_base: bool,
}

/// Merge `overlay` into `base`
///
/// The result keeps the base header and kerning block. Overlay glyphs taken
/// into the result have their texture slot rebased when
/// [`MergeOptions::target_slot`] is set.
///
/// The scale field follows the base glyphs: it becomes [`SCALE_4K`] only when
/// a 1K base is promoted. A 4K overlay over an unpromoted 1K base leaves the
/// base scale in place, since the base records still hold 1K coordinates.
pub fn merge(base: &FontTable, overlay: &FontTable, options: &MergeOptions) -> FontTable {
    let promote = options.promote_low_resolution_base
        && base.scale() == SCALE_1K
        && overlay.scale() == SCALE_4K;

    let mut merged: BTreeMap<u32, GlyphEntry> = base
        .glyphs
        .iter()
        .map(|g| {
            let glyph = if promote { promoted(*g) } else { *g };
            (g.code_point, glyph)
        })
        .collect();

    let min_overlay_slot = overlay.glyphs.iter().map(|g| g.texture_slot).min().unwrap_or(0);
    let mut max_slot: Option<u16> = None;
    let mut added = 0usize;

    for glyph in &overlay.glyphs {
        let present = merged.contains_key(&glyph.code_point);
        if present && options.strategy == MergeStrategy::PreferBase {
            continue;
        }
        let mut glyph = *glyph;
        if let Some(target) = options.target_slot {
            glyph.texture_slot = target.wrapping_add(glyph.texture_slot.wrapping_sub(min_overlay_slot));
            max_slot = max_slot.max(Some(glyph.texture_slot));
        }
        merged.insert(glyph.code_point, glyph);
        added += 1;
    }

    let mut out = FontTable {
        header: base.header,
        glyphs: merged.into_values().collect(),
        kerning: base.kerning.clone(),
    };
    if promote {
        out.set_scale(SCALE_4K);
    }
    if let Some(slot) = max_slot {
        let needed = u32::from(slot) + 1;
        if needed > out.texture_count() {
            out.set_texture_count(needed);
        }
    }

    debug!(
        "Merged font table: {} base glyphs, {} taken from overlay, {} total",
        base.glyphs.len(),
        added,
        out.glyphs.len()
    );
    out
}

/// Merge two encoded tables
pub fn merge_bytes(base: &[u8], overlay: &[u8], options: &MergeOptions) -> FdtResult<Vec<u8>> {
    let base = FontTable::parse(base)?;
    let overlay = FontTable::parse(overlay)?;
    merge(&base, &overlay, options).to_bytes()
}

/// Scale a 1K glyph into 4K coordinates
fn promoted(glyph: GlyphEntry) -> GlyphEntry {
    GlyphEntry {
        advance: glyph.advance.wrapping_mul(4),
        u: glyph.u.wrapping_mul(4),
        v: glyph.v.wrapping_mul(4),
        width: glyph.width.saturating_mul(4),
        height: glyph.height.saturating_mul(4),
        offset_y: glyph.offset_y.saturating_mul(4),
        ..glyph
    }
}
