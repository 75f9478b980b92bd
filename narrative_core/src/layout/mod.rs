//! Spatial layout - greedy constraint placement of biome archetypes on a 2D grid.
//!
//! Generation runs in five steps:
//! 1. **Mask**: cut an irregular island footprint out of grids larger than 4x4
//! 2. **Edges**: mark cells touching the grid border or a cut cell
//! 3. **Constraints**: edge preference, forbidden neighbors, coastal adjacency
//! 4. **Guaranteed placement**: every distinct requested biome once, edges first
//! 5. **Fill**: the remaining cells from the pool in random order
//!
//! The solver never backtracks. A biome with no valid cell falls back to the
//! default biome, so a world always comes out, even if a preference had to give.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use world_rules::{keys, TemplateStore};

/// Grid coordinate `(x, y)`.
pub type Coord = (i32, i32);

/// Threshold of normalized squared distance (plus noise) beyond which cells are cut.
const MASK_THRESHOLD: f64 = 0.90;
const MASK_NOISE: f64 = 0.1;
/// Grids at or below this size on either side are never masked.
const MASK_MIN_SIDE: u32 = 4;

/// A grid of optional biome archetype ids. Cells cut by the mask do not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialLayout {
    pub width: u32,
    pub height: u32,
    cells: BTreeMap<Coord, Option<String>>,
}

/// Flat, serializable view of a layout for map front ends.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutCell {
    pub x: i32,
    pub y: i32,
    pub biome: Option<String>,
    pub edge: bool,
    pub neighbors: Vec<Coord>,
}

impl SpatialLayout {
    /// A fully open, empty grid.
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = BTreeMap::new();
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.insert((x, y), None);
            }
        }
        Self { width, height, cells }
    }

    /// Whether a cell exists (inside the grid and not cut by the mask).
    pub fn is_open(&self, coord: Coord) -> bool {
        self.cells.contains_key(&coord)
    }

    pub fn biome_at(&self, coord: Coord) -> Option<&str> {
        self.cells.get(&coord).and_then(|b| b.as_deref())
    }

    /// Place a biome on an open cell. Returns false for cut or out-of-grid cells.
    pub fn set(&mut self, coord: Coord, biome: &str) -> bool {
        match self.cells.get_mut(&coord) {
            Some(cell) => {
                *cell = Some(biome.to_string());
                true
            }
            None => false,
        }
    }

    fn cut(&mut self, coord: Coord) {
        self.cells.remove(&coord);
    }

    /// Open 4-neighbors of a cell.
    pub fn neighbors(&self, coord: Coord) -> Vec<Coord> {
        let (x, y) = coord;
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(|c| self.is_open(*c))
            .collect()
    }

    /// An open cell is an edge if any 4-neighbor is outside the grid or cut.
    pub fn is_edge(&self, coord: Coord) -> bool {
        self.is_open(coord) && self.neighbors(coord).len() < 4
    }

    pub fn open_cells(&self) -> Vec<Coord> {
        self.cells.keys().copied().collect()
    }

    pub fn free_cells(&self) -> Vec<Coord> {
        self.cells
            .iter()
            .filter(|(_, b)| b.is_none())
            .map(|(c, _)| *c)
            .collect()
    }

    /// Occupied cells with their biome ids, in coordinate order.
    pub fn occupied(&self) -> impl Iterator<Item = (Coord, &str)> {
        self.cells
            .iter()
            .filter_map(|(c, b)| b.as_deref().map(|b| (*c, b)))
    }

    /// Occupied neighbors of every occupied cell.
    pub fn adjacency(&self) -> BTreeMap<Coord, Vec<Coord>> {
        self.occupied()
            .map(|(coord, _)| {
                let neighbors = self
                    .neighbors(coord)
                    .into_iter()
                    .filter(|n| self.biome_at(*n).is_some())
                    .collect();
                (coord, neighbors)
            })
            .collect()
    }

    pub fn export(&self) -> Vec<LayoutCell> {
        self.cells
            .iter()
            .map(|(&(x, y), biome)| LayoutCell {
                x,
                y,
                biome: biome.clone(),
                edge: self.is_edge((x, y)),
                neighbors: self.neighbors((x, y)),
            })
            .collect()
    }
}

/// Places biome archetypes from a [`TemplateStore`] onto a layout.
pub struct SpatialLayoutGenerator<'a> {
    templates: &'a TemplateStore,
}

impl<'a> SpatialLayoutGenerator<'a> {
    pub fn new(templates: &'a TemplateStore) -> Self {
        Self { templates }
    }

    /// Build a `width x height` layout from `biome_pool`.
    ///
    /// `fill_ratio` caps the share of open cells that receive a biome.
    pub fn generate<R: Rng>(
        &self,
        width: u32,
        height: u32,
        biome_pool: &[String],
        default_biome: &str,
        fill_ratio: f64,
        rng: &mut R,
    ) -> SpatialLayout {
        let mut layout = SpatialLayout::new(width, height);
        self.apply_mask(&mut layout, rng);

        let open = layout.open_cells();
        let target = ((open.len() as f64) * fill_ratio.clamp(0.0, 1.0)).floor() as usize;

        let mut edge_cells: Vec<Coord> = open.iter().copied().filter(|c| layout.is_edge(*c)).collect();
        let mut inner_cells: Vec<Coord> = open.iter().copied().filter(|c| !layout.is_edge(*c)).collect();
        edge_cells.shuffle(rng);
        inner_cells.shuffle(rng);
        let ordered: Vec<Coord> = edge_cells.into_iter().chain(inner_cells).collect();

        let mut unique: Vec<&str> = Vec::new();
        for biome in biome_pool {
            if !unique.contains(&biome.as_str()) {
                unique.push(biome);
            }
        }
        unique.shuffle(rng);
        // Edge-only biomes pick first, biomes that avoid edges pick last.
        unique.sort_by_key(|b| self.edge_preference(b));

        let mut placed = 0usize;
        for biome in &unique {
            if placed >= target {
                break;
            }
            let spot = ordered
                .iter()
                .copied()
                .find(|c| layout.biome_at(*c).is_none() && self.can_place(biome, *c, &layout));
            match spot {
                Some(coord) => {
                    layout.set(coord, biome);
                }
                None => {
                    warn!(biome, "no valid cell, placing default biome instead");
                    let Some(coord) = ordered.iter().copied().find(|c| layout.biome_at(*c).is_none()) else {
                        break;
                    };
                    layout.set(coord, default_biome);
                }
            }
            placed += 1;
        }

        let remaining: Vec<Coord> = ordered
            .iter()
            .copied()
            .filter(|c| layout.biome_at(*c).is_none())
            .collect();
        for coord in remaining {
            if placed >= target {
                break;
            }
            let mut candidates = unique.clone();
            candidates.shuffle(rng);
            let choice = candidates
                .into_iter()
                .find(|b| self.can_place(b, coord, &layout))
                .unwrap_or(default_biome);
            layout.set(coord, choice);
            placed += 1;
        }

        debug!(width, height, placed, "spatial layout generated");
        layout
    }

    /// Cut cells far from the center to give the map an island outline.
    fn apply_mask<R: Rng>(&self, layout: &mut SpatialLayout, rng: &mut R) {
        if layout.width <= MASK_MIN_SIDE || layout.height <= MASK_MIN_SIDE {
            return;
        }
        let half_w = f64::from(layout.width) / 2.0;
        let half_h = f64::from(layout.height) / 2.0;

        for coord in layout.open_cells() {
            let dx = (f64::from(coord.0) - half_w) / half_w;
            let dy = (f64::from(coord.1) - half_h) / half_h;
            let noise = rng.gen_range(-MASK_NOISE..=MASK_NOISE);
            if dx * dx + dy * dy + noise > MASK_THRESHOLD {
                layout.cut(coord);
            }
        }
    }

    fn has_tag(&self, biome: &str, tag: &str) -> bool {
        self.templates
            .biomes
            .get(biome)
            .map_or(false, |t| t.tags.iter().any(|x| x == tag))
    }

    fn edge_preference(&self, biome: &str) -> u8 {
        if self.has_tag(biome, keys::TAG_EDGE_ONLY) {
            0
        } else if self.has_tag(biome, keys::TAG_NO_EDGE) {
            2
        } else {
            1
        }
    }

    /// Whether either biome lists the other as a forbidden neighbor.
    fn forbids(&self, a: &str, b: &str) -> bool {
        let lists = |x: &str, y: &str| {
            self.templates
                .biomes
                .get(x)
                .map_or(false, |t| t.forbidden_neighbors.iter().any(|f| f == y))
        };
        lists(a, b) || lists(b, a)
    }

    /// Constraint check for placing `biome` at `coord`.
    ///
    /// Unknown biome ids (such as an unregistered default) carry no constraints.
    pub fn can_place(&self, biome: &str, coord: Coord, layout: &SpatialLayout) -> bool {
        let edge = layout.is_edge(coord);
        if self.has_tag(biome, keys::TAG_EDGE_ONLY) && !edge {
            return false;
        }
        if self.has_tag(biome, keys::TAG_NO_EDGE) && edge {
            return false;
        }

        let neighbors = layout.neighbors(coord);
        if neighbors
            .iter()
            .filter_map(|n| layout.biome_at(*n))
            .any(|n| self.forbids(biome, n))
        {
            return false;
        }

        if self.has_tag(biome, keys::TAG_COASTAL) && !edge {
            // Needs an edge neighbor that is not itself taken by coast.
            return neighbors.iter().any(|n| {
                layout.is_edge(*n)
                    && layout
                        .biome_at(*n)
                        .map_or(true, |b| !self.has_tag(b, keys::TAG_COASTAL))
            });
        }
        true
    }
}
