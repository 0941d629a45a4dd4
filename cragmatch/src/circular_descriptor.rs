use crate::image_frame::ImageFrame;
use kd_tree::KdPoint;

/// Colour "center of mass" summary of a circular neighbourhood of a frame.
///
/// For each of R, G and B the offset of the channel's centroid from the circle centre
/// is measured, then all three are rotated so the combined centroid lies on the
/// positive x axis. The result does not change when the neighbourhood is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct CircularDescriptor {
    /// Position of this descriptor in lattice (row-major) order.
    pub index: usize,
    pub center_x: u32,
    pub center_y: u32,
    /// Distance of the combined colour centroid from the centre, in pixels.
    pub total_radius: f32,
    /// Aligned (x, y) centroid offsets for red, green and blue.
    pub aligned: [f32; 6],
    /// `aligned` quantized to hundredths of a pixel, used as the k-d tree key.
    pub feature_vector: [i64; 6],
}

impl CircularDescriptor {
    pub fn distance(&self, other: &CircularDescriptor) -> f32 {
        self.aligned
            .iter()
            .zip(other.aligned.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

impl KdPoint for CircularDescriptor {
    type Scalar = i64;
    type Dim = typenum::U6;
    fn at(&self, k: usize) -> i64 {
        self.feature_vector[k]
    }
}

#[derive(Default)]
struct ChannelMoments {
    sum: i64,
    weighted_x: i64,
    weighted_y: i64,
}

impl ChannelMoments {
    fn add(&mut self, dx: i64, dy: i64, value: i64) {
        self.sum += value;
        self.weighted_x += dx * value;
        self.weighted_y += dy * value;
    }

    fn centroid(&self) -> (f32, f32) {
        if self.sum == 0 {
            return (0.0, 0.0);
        }
        (
            self.weighted_x as f32 / self.sum as f32,
            self.weighted_y as f32 / self.sum as f32,
        )
    }
}

/// Computes descriptors on a regular lattice of `frame`, `stride` pixels apart.
///
/// Neighbourhoods reaching past the frame edge read the nearest edge pixel.
pub(crate) fn lattice_descriptors(
    frame: &ImageFrame,
    stride: usize,
    radius: usize,
) -> Vec<CircularDescriptor> {
    let width = frame.working_width() as usize;
    let height = frame.working_height() as usize;
    let stride = stride.max(1);

    let mut descriptors = Vec::with_capacity(width.div_ceil(stride) * height.div_ceil(stride));
    for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            let index = descriptors.len();
            descriptors.push(describe(frame, x, y, radius, index));
        }
    }
    descriptors
}

fn describe(
    frame: &ImageFrame,
    center_x: usize,
    center_y: usize,
    radius: usize,
    index: usize,
) -> CircularDescriptor {
    let width = frame.working_width() as i64;
    let height = frame.working_height() as i64;
    let pixels = frame.pixels();
    let r = radius as i64;

    let mut channels: [ChannelMoments; 3] = Default::default();
    for dy in -r..=r {
        let row_radius = (((r * r - dy * dy) as f64).sqrt().round()) as i64;
        let y = (center_y as i64 + dy).clamp(0, height - 1);
        for dx in -row_radius..=row_radius {
            let x = (center_x as i64 + dx).clamp(0, width - 1);
            let offset = 4 * (y * width + x) as usize;
            for (c, moments) in channels.iter_mut().enumerate() {
                moments.add(dx, dy, pixels[offset + c] as i64);
            }
        }
    }

    let sum_all: i64 = channels.iter().map(|c| c.sum).sum();
    let (total_x, total_y) = if sum_all == 0 {
        (0.0, 0.0)
    } else {
        (
            channels.iter().map(|c| c.weighted_x).sum::<i64>() as f32 / sum_all as f32,
            channels.iter().map(|c| c.weighted_y).sum::<i64>() as f32 / sum_all as f32,
        )
    };
    let total_angle = total_y.atan2(total_x);

    let mut aligned = [0.0f32; 6];
    for (c, moments) in channels.iter().enumerate() {
        let (cx, cy) = moments.centroid();
        let angle = cy.atan2(cx) - total_angle;
        let radius = (cx * cx + cy * cy).sqrt();
        aligned[2 * c] = angle.cos() * radius;
        aligned[2 * c + 1] = angle.sin() * radius;
    }

    CircularDescriptor {
        index,
        center_x: center_x as u32,
        center_y: center_y as u32,
        total_radius: (total_x * total_x + total_y * total_y).sqrt(),
        aligned,
        feature_vector: aligned.map(|v| (v * 100.0).round() as i64),
    }
}
