//! Static tetrahedral mesh carrying the grid velocity field.
//!
//! Nodes sit on a regular lattice over an axis-aligned domain. Each lattice
//! cell is split into 5 tetrahedra, alternating between two mirror patterns
//! by cell parity so that neighboring cells share their face diagonals.
//!
//! Node positions and connectivity never change after construction; only the
//! node velocities are simulation state. Adjacency is derived once and cached.

use glam::Vec3;

use crate::constants::{CONTAINMENT_EPSILON, DEGENERATE_VOLUME};
use crate::error::{SimError, SimResult};
use crate::spatial_index::SpatialIndex;

/// Four node indices. Orientation is not normalized: signed volume may be negative.
pub type Tetrahedron = [usize; 4];

/// Corner `b` of a lattice cell has offset `(b & 1, (b >> 1) & 1, (b >> 2) & 1)`.
///
/// Every tetrahedron is ordered so that node 0 -> node 1/2/3 has a nonzero
/// offset along x/y/z respectively. Corner tetrahedra list the corner first,
/// followed by its x-, y- and z-neighbors.
const EVEN_CELL: [[usize; 4]; 5] = [
    [1, 0, 3, 5],
    [2, 3, 0, 6],
    [4, 5, 6, 0],
    [7, 6, 5, 3],
    [0, 5, 3, 6],
];

const ODD_CELL: [[usize; 4]; 5] = [
    [0, 1, 2, 4],
    [3, 2, 1, 7],
    [5, 4, 7, 1],
    [6, 7, 4, 2],
    [1, 2, 7, 4],
];

/// Signed volume of a tetrahedron (scalar triple product / 6).
#[inline]
pub fn signed_volume(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> f32 {
    (p1 - p0).dot((p2 - p0).cross(p3 - p0)) / 6.0
}

/// Barycentric coordinates of `p` with respect to `(p0, p1, p2, p3)`.
///
/// Degenerate tetrahedra (|volume| < 1e-10) yield the centroid weights.
pub fn barycentric_coords(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, p: Vec3) -> [f32; 4] {
    let volume = signed_volume(p0, p1, p2, p3);
    if volume.abs() < DEGENERATE_VOLUME {
        return [0.25; 4];
    }
    let inv = 1.0 / volume;
    [
        signed_volume(p, p1, p2, p3) * inv,
        signed_volume(p0, p, p2, p3) * inv,
        signed_volume(p0, p1, p, p3) * inv,
        signed_volume(p0, p1, p2, p) * inv,
    ]
}

/// Whether barycentric weights describe a point inside (or on) the tetrahedron.
#[inline]
pub fn is_inside(weights: &[f32; 4]) -> bool {
    weights.iter().all(|&w| w >= -CONTAINMENT_EPSILON)
}

/// Outcome of scanning a list of candidate tetrahedra.
enum Scan {
    Found(usize, [f32; 4]),
    /// Every candidate was degenerate; holds the first one
    Degenerate(usize),
    Missing,
}

impl Scan {
    /// A degenerate hit is located at its centroid weights.
    fn resolve(self) -> Option<(usize, [f32; 4])> {
        match self {
            Scan::Found(tet, weights) => Some((tet, weights)),
            Scan::Degenerate(tet) => Some((tet, [0.25; 4])),
            Scan::Missing => None,
        }
    }
}

/// Compressed per-node lists (`offsets[n]..offsets[n + 1]` into `items`).
#[derive(Clone, Debug, Default)]
struct Adjacency {
    offsets: Vec<usize>,
    items: Vec<usize>,
}

impl Adjacency {
    fn from_lists(lists: Vec<Vec<usize>>) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        offsets.push(0);
        let mut items = Vec::with_capacity(lists.iter().map(Vec::len).sum());
        for list in lists {
            items.extend(list);
            offsets.push(items.len());
        }
        Self { offsets, items }
    }

    #[inline]
    fn get(&self, node: usize) -> &[usize] {
        &self.items[self.offsets[node]..self.offsets[node + 1]]
    }
}

/// Tetrahedral mesh over an axis-aligned box.
#[derive(Clone, Debug)]
pub struct TetMesh {
    domain_min: Vec3,
    domain_max: Vec3,
    resolution: (usize, usize, usize),
    spacing: Vec3,

    /// Node positions (immutable)
    nodes: Vec<Vec3>,
    /// Node velocities (simulation state)
    velocities: Vec<Vec3>,
    /// Node velocities captured after P2G, before forces (for FLIP delta)
    old_velocities: Vec<Vec3>,

    tetrahedra: Vec<Tetrahedron>,
    /// Signed volume per tetrahedron
    volumes: Vec<f32>,

    incident: Adjacency,
    neighbors: Adjacency,
    index: SpatialIndex,
}

impl TetMesh {
    /// Build a lattice mesh with `nx * ny * nz` cells of 5 tetrahedra each.
    pub fn new(domain_min: Vec3, domain_max: Vec3, resolution: (usize, usize, usize)) -> SimResult<Self> {
        let (nx, ny, nz) = resolution;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(SimError::InvalidResolution { nx, ny, nz });
        }
        if !domain_min.is_finite() || !domain_max.is_finite() || !domain_min.cmplt(domain_max).all() {
            return Err(SimError::InvalidDomain {
                min: domain_min,
                max: domain_max,
            });
        }

        let spacing = (domain_max - domain_min) / Vec3::new(nx as f32, ny as f32, nz as f32);
        let node_count = (nx + 1) * (ny + 1) * (nz + 1);

        let mut nodes = Vec::with_capacity(node_count);
        for k in 0..=nz {
            let z = lattice_coord(domain_min.z, domain_max.z, k, nz);
            for j in 0..=ny {
                let y = lattice_coord(domain_min.y, domain_max.y, j, ny);
                for i in 0..=nx {
                    let x = lattice_coord(domain_min.x, domain_max.x, i, nx);
                    nodes.push(Vec3::new(x, y, z));
                }
            }
        }

        let node_index = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

        let mut tetrahedra = Vec::with_capacity(5 * nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let corners: [usize; 8] = std::array::from_fn(|b| {
                        node_index(i + (b & 1), j + ((b >> 1) & 1), k + ((b >> 2) & 1))
                    });
                    let pattern = if (i + j + k) % 2 == 0 { &EVEN_CELL } else { &ODD_CELL };
                    for local in pattern {
                        tetrahedra.push(local.map(|c| corners[c]));
                    }
                }
            }
        }

        let volumes: Vec<f32> = tetrahedra
            .iter()
            .map(|t| signed_volume(nodes[t[0]], nodes[t[1]], nodes[t[2]], nodes[t[3]]))
            .collect();

        let (incident, neighbors) = build_adjacency(node_count, &tetrahedra);

        let bounds: Vec<(Vec3, Vec3)> = tetrahedra
            .iter()
            .map(|t| {
                let pts = t.map(|n| nodes[n]);
                let lo = pts[0].min(pts[1]).min(pts[2]).min(pts[3]);
                let hi = pts[0].max(pts[1]).max(pts[2]).max(pts[3]);
                (lo, hi)
            })
            .collect();
        let index = SpatialIndex::build(domain_min, domain_max, [nx, ny, nz], &bounds);

        Ok(Self {
            domain_min,
            domain_max,
            resolution,
            spacing,
            nodes,
            velocities: vec![Vec3::ZERO; node_count],
            old_velocities: vec![Vec3::ZERO; node_count],
            tetrahedra,
            volumes,
            incident,
            neighbors,
            index,
        })
    }

    // ========== Sizes and bounds ==========

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tet_count(&self) -> usize {
        self.tetrahedra.len()
    }

    /// Domain bounds as (min, max).
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.domain_min, self.domain_max)
    }

    pub fn resolution(&self) -> (usize, usize, usize) {
        self.resolution
    }

    /// Lattice spacing per axis.
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    // ========== Field accessors ==========

    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn velocities_mut(&mut self) -> &mut [Vec3] {
        &mut self.velocities
    }

    /// Node velocities as a flat `[x0, y0, z0, x1, ...]` view.
    pub fn velocities_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.velocities)
    }

    /// Node positions (read) and velocities (write).
    pub fn split_velocities_mut(&mut self) -> (&[Vec3], &mut [Vec3]) {
        (&self.nodes, &mut self.velocities)
    }

    pub fn old_velocities(&self) -> &[Vec3] {
        &self.old_velocities
    }

    /// Snapshot the current node velocities for the FLIP delta.
    pub fn store_old_velocities(&mut self) {
        self.old_velocities.copy_from_slice(&self.velocities);
    }

    /// Zero every node velocity (and the stored snapshot).
    pub fn clear_velocities(&mut self) {
        self.velocities.fill(Vec3::ZERO);
        self.old_velocities.fill(Vec3::ZERO);
    }

    pub fn tetrahedra(&self) -> &[Tetrahedron] {
        &self.tetrahedra
    }

    pub fn tetrahedron(&self, tet: usize) -> Tetrahedron {
        self.tetrahedra[tet]
    }

    /// Signed volume of a tetrahedron.
    pub fn volume(&self, tet: usize) -> f32 {
        self.volumes[tet]
    }

    pub fn is_degenerate(&self, tet: usize) -> bool {
        self.volumes[tet].abs() < DEGENERATE_VOLUME
    }

    /// Vertex positions of a tetrahedron in stored order.
    pub fn tet_positions(&self, tet: usize) -> [Vec3; 4] {
        self.tetrahedra[tet].map(|n| self.nodes[n])
    }

    // ========== Adjacency ==========

    /// Tetrahedra incident to `node`, ascending.
    pub fn incident_tets(&self, node: usize) -> &[usize] {
        self.incident.get(node)
    }

    /// Nodes sharing at least one tetrahedron with `node`, ascending.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.neighbors.get(node)
    }

    // ========== Point queries ==========

    /// Barycentric weights of `point` in tetrahedron `tet`.
    pub fn barycentric(&self, tet: usize, point: Vec3) -> [f32; 4] {
        let [p0, p1, p2, p3] = self.tet_positions(tet);
        barycentric_coords(p0, p1, p2, p3, point)
    }

    /// Index of the tetrahedron containing `point`, if any.
    pub fn locate(&self, point: Vec3) -> Option<usize> {
        self.locate_weighted(point).map(|(tet, _)| tet)
    }

    /// Containing tetrahedron together with the barycentric weights of `point`.
    pub fn locate_weighted(&self, point: Vec3) -> Option<(usize, [f32; 4])> {
        if !self.index.covers(point) {
            return None;
        }
        let candidates = self.index.candidates(point);
        match self.scan(candidates.iter().copied(), point) {
            Scan::Found(tet, weights) => Some((tet, weights)),
            // Rounding near bucket planes can push a point out of its bucket's
            // tets, and a bucket of degenerate tets says nothing about the rest.
            Scan::Degenerate(_) | Scan::Missing => self.scan(0..self.tetrahedra.len(), point).resolve(),
        }
    }

    /// Reference point location: exhaustive scan in ascending tetrahedron order.
    pub fn locate_linear(&self, point: Vec3) -> Option<usize> {
        self.scan(0..self.tetrahedra.len(), point)
            .resolve()
            .map(|(tet, _)| tet)
    }

    /// First non-degenerate candidate containing `point`.
    fn scan(&self, candidates: impl IntoIterator<Item = usize>, point: Vec3) -> Scan {
        let mut first_degenerate = None;
        let mut all_degenerate = true;

        for tet in candidates {
            if self.is_degenerate(tet) {
                first_degenerate.get_or_insert(tet);
                continue;
            }
            all_degenerate = false;
            let weights = self.barycentric(tet, point);
            if is_inside(&weights) {
                return Scan::Found(tet, weights);
            }
        }

        match first_degenerate {
            Some(tet) if all_degenerate => Scan::Degenerate(tet),
            _ => Scan::Missing,
        }
    }

    /// Interpolate a per-node field at barycentric weights inside `tet`.
    #[inline]
    pub fn interpolate(&self, field: &[Vec3], tet: usize, weights: &[f32; 4]) -> Vec3 {
        let t = &self.tetrahedra[tet];
        field[t[0]] * weights[0]
            + field[t[1]] * weights[1]
            + field[t[2]] * weights[2]
            + field[t[3]] * weights[3]
    }
}

/// Lattice coordinate `i` of `n` cells; the last node lands exactly on `max`.
#[inline]
fn lattice_coord(min: f32, max: f32, i: usize, n: usize) -> f32 {
    if i == n {
        max
    } else {
        min + (max - min) * (i as f32 / n as f32)
    }
}

fn build_adjacency(node_count: usize, tetrahedra: &[Tetrahedron]) -> (Adjacency, Adjacency) {
    let mut incident = vec![Vec::new(); node_count];
    let mut neighbors = vec![Vec::new(); node_count];

    for (tet, nodes) in tetrahedra.iter().enumerate() {
        for &a in nodes {
            incident[a].push(tet);
            neighbors[a].extend(nodes.iter().copied().filter(|&b| b != a));
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }

    (Adjacency::from_lists(incident), Adjacency::from_lists(neighbors))
}
