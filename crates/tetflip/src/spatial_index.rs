//! Uniform bucket grid over the mesh domain for fast point location.
//!
//! Every tetrahedron is registered in each bucket its bounding box overlaps.
//! Buckets store tetrahedron ids in ascending order, so scanning a bucket
//! visits candidates in the same order as an exhaustive scan of the mesh.

use glam::Vec3;

/// Relative margin (in bucket widths) within which points outside the
/// indexed box are still mapped to the nearest boundary bucket.
const EDGE_MARGIN: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct SpatialIndex {
    min: Vec3,
    max: Vec3,
    inv_bucket_size: Vec3,
    dims: [usize; 3],
    /// `starts[b]..starts[b + 1]` is bucket `b`'s range in `entries`
    starts: Vec<usize>,
    entries: Vec<usize>,
}

impl SpatialIndex {
    /// Build an index over `[min, max]` with `dims` buckets per axis from a
    /// list of per-item bounding boxes. Item ids are their positions in
    /// `bounds`.
    pub fn build(min: Vec3, max: Vec3, dims: [usize; 3], bounds: &[(Vec3, Vec3)]) -> Self {
        let dims = dims.map(|d| d.max(1));
        let extent = (max - min).max(Vec3::splat(f32::MIN_POSITIVE));
        let inv_bucket_size = Vec3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32) / extent;
        let bucket_count = dims[0] * dims[1] * dims[2];

        let mut index = Self {
            min,
            max,
            inv_bucket_size,
            dims,
            starts: vec![0; bucket_count + 1],
            entries: Vec::new(),
        };

        // Counting sort: count, prefix-sum, then fill. Items are visited in
        // ascending order so each bucket ends up sorted.
        for &(lo, hi) in bounds {
            let (b_lo, b_hi) = index.bucket_range(lo, hi);
            for k in b_lo[2]..=b_hi[2] {
                for j in b_lo[1]..=b_hi[1] {
                    for i in b_lo[0]..=b_hi[0] {
                        let bucket = index.bucket_index(i, j, k);
                        index.starts[bucket + 1] += 1;
                    }
                }
            }
        }
        for b in 0..bucket_count {
            index.starts[b + 1] += index.starts[b];
        }

        index.entries = vec![0; index.starts[bucket_count]];
        let mut cursor = index.starts[..bucket_count].to_vec();
        for (item, &(lo, hi)) in bounds.iter().enumerate() {
            let (b_lo, b_hi) = index.bucket_range(lo, hi);
            for k in b_lo[2]..=b_hi[2] {
                for j in b_lo[1]..=b_hi[1] {
                    for i in b_lo[0]..=b_hi[0] {
                        let bucket = index.bucket_index(i, j, k);
                        index.entries[cursor[bucket]] = item;
                        cursor[bucket] += 1;
                    }
                }
            }
        }

        index
    }

    #[inline]
    fn bucket_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Continuous bucket coordinate clamped to the grid.
    #[inline]
    fn clamped_coord(&self, point: Vec3) -> [usize; 3] {
        let rel = (point - self.min) * self.inv_bucket_size;
        [
            clamp_axis(rel.x.floor(), self.dims[0]),
            clamp_axis(rel.y.floor(), self.dims[1]),
            clamp_axis(rel.z.floor(), self.dims[2]),
        ]
    }

    fn bucket_range(&self, lo: Vec3, hi: Vec3) -> ([usize; 3], [usize; 3]) {
        let b_lo = self.clamped_coord(lo);
        // A box ending exactly on a bucket plane does not reach into the next bucket.
        let rel_hi = (hi - self.min) * self.inv_bucket_size;
        let b_hi = [
            clamp_axis(rel_hi.x.ceil() - 1.0, self.dims[0]).max(b_lo[0]),
            clamp_axis(rel_hi.y.ceil() - 1.0, self.dims[1]).max(b_lo[1]),
            clamp_axis(rel_hi.z.ceil() - 1.0, self.dims[2]).max(b_lo[2]),
        ];
        (b_lo, b_hi)
    }

    /// Whether `point` lies in the indexed box (with a small edge margin).
    pub fn covers(&self, point: Vec3) -> bool {
        let margin = EDGE_MARGIN / self.inv_bucket_size.max_element().max(f32::MIN_POSITIVE);
        point.cmpge(self.min - margin).all() && point.cmple(self.max + margin).all()
    }

    /// Candidate ids for `point`, ascending. Empty outside the indexed box.
    pub fn candidates(&self, point: Vec3) -> &[usize] {
        if !self.covers(point) {
            return &[];
        }
        let [i, j, k] = self.clamped_coord(point);
        let bucket = self.bucket_index(i, j, k);
        &self.entries[self.starts[bucket]..self.starts[bucket + 1]]
    }

    pub fn bucket_count(&self) -> usize {
        self.starts.len() - 1
    }

    /// Largest number of ids stored in a single bucket.
    pub fn max_bucket_len(&self) -> usize {
        self.starts.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
    }
}

#[inline]
fn clamp_axis(value: f32, dim: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        (value as usize).min(dim - 1)
    }
}
