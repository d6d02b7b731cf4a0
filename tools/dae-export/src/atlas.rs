//! Image atlas packer
//!
//! Packs glyph images into one RGBA atlas. Each image is cropped to its
//! non-transparent bounds, images are placed largest first at candidate
//! corners of the rectangles already placed, and the atlas grows to the next
//! size its [`SizeRule`] allows whenever a placement needs more room.

use anyhow::{bail, Result};
use image::{imageops, RgbaImage};
use serde::Deserialize;

/// Largest atlas edge when no size constraint is given.
pub const DEFAULT_MAX_SIZE: u32 = 4096;

/// Tie-break between candidate placements that need the same atlas growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    /// Closest top-left corner to the atlas origin
    #[value(name = "topleft")]
    TopLeft,
    /// Closest bottom-right corner to the atlas origin
    #[default]
    #[value(name = "bottomright")]
    BottomRight,
}

impl Heuristic {
    fn score(self, rect: &Rect) -> u64 {
        let (x, y) = match self {
            Heuristic::TopLeft => (rect.x as u64, rect.y as u64),
            Heuristic::BottomRight => (rect.right() as u64, rect.bottom() as u64),
        };
        x * x + y * y
    }
}

/// Allowed sizes along one atlas axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeRule {
    /// Exactly this size
    Fixed(u32),
    /// One of these sizes
    Valid(Vec<u32>),
    /// Any size up to `max`, rounded up to a multiple of `divisible_by`
    Max { max: u32, divisible_by: u32 },
}

impl Default for SizeRule {
    fn default() -> Self {
        SizeRule::Valid((0..=DEFAULT_MAX_SIZE.trailing_zeros()).map(|p| 1 << p).collect())
    }
}

impl SizeRule {
    /// Smallest allowed size that holds `needed` pixels.
    pub fn next_allowed(&self, needed: u32) -> Option<u32> {
        match self {
            SizeRule::Fixed(size) => (needed <= *size).then_some(*size),
            SizeRule::Valid(sizes) => sizes.iter().copied().filter(|&s| s >= needed).min(),
            SizeRule::Max { max, divisible_by } => {
                let step = (*divisible_by).max(1);
                let size = needed.max(1).div_ceil(step) * step;
                (size <= *max).then_some(size)
            }
        }
    }

    /// Parse a `a:b:c` list of valid sizes.
    pub fn parse_valid(list: &str) -> Result<Self> {
        let sizes = list
            .split(':')
            .map(|s| s.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid size list '{}': {}", list, e))?;
        if sizes.is_empty() || sizes.contains(&0) {
            bail!("Invalid size list '{}'", list);
        }
        Ok(SizeRule::Valid(sizes))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackSettings {
    pub width: SizeRule,
    pub height: SizeRule,
    /// Transparent border kept around every placed image
    pub padding: u32,
    pub heuristic: Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    fn right(&self) -> u32 {
        self.x + self.width
    }

    fn bottom(&self) -> u32 {
        self.y + self.height
    }

    fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Where one source image ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Position of the cropped pixels in the atlas
    pub atlas_x: u32,
    pub atlas_y: u32,
    /// Offset of the crop inside the source image
    pub crop_x: u32,
    pub crop_y: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub image: RgbaImage,
    /// One entry per source image, in input order
    pub placements: Vec<Placement>,
}

impl PackedAtlas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Bounds of the non-transparent pixels. Fully transparent images keep
/// their whole area.
fn crop_bounds(image: &RgbaImage) -> Rect {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0, 0);
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] != 0 {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
    }
    if min.0 == u32::MAX {
        return Rect {
            x: 0,
            y: 0,
            width: image.width(),
            height: image.height(),
        };
    }
    Rect {
        x: min.0,
        y: min.1,
        width: max.0 - min.0 + 1,
        height: max.1 - min.1 + 1,
    }
}

fn same_pixels(a: &RgbaImage, a_crop: &Rect, b: &RgbaImage, b_crop: &Rect) -> bool {
    if a_crop.width != b_crop.width || a_crop.height != b_crop.height {
        return false;
    }
    (0..a_crop.height).all(|y| {
        (0..a_crop.width).all(|x| {
            a.get_pixel(a_crop.x + x, a_crop.y + y) == b.get_pixel(b_crop.x + x, b_crop.y + y)
        })
    })
}

struct Packer<'s> {
    settings: &'s PackSettings,
    placed: Vec<Rect>,
    width: u32,
    height: u32,
}

impl Packer<'_> {
    /// Atlas size after placing `rect`, or `None` when no allowed size holds it.
    fn grown_size(&self, rect: &Rect) -> Option<(u32, u32)> {
        let width = if rect.right() <= self.width {
            self.width
        } else {
            self.settings.width.next_allowed(rect.right())?
        };
        let height = if rect.bottom() <= self.height {
            self.height
        } else {
            self.settings.height.next_allowed(rect.bottom())?
        };
        Some((width, height))
    }

    fn place(&mut self, width: u32, height: u32) -> Option<Rect> {
        let corners = std::iter::once((0, 0)).chain(
            self.placed
                .iter()
                .flat_map(|r| [(r.right(), r.y), (r.x, r.bottom())]),
        );

        // (grows, heuristic score, rect, new size)
        let mut best: Option<(bool, u64, Rect, (u32, u32))> = None;
        for (x, y) in corners {
            let rect = Rect {
                x,
                y,
                width,
                height,
            };
            if self.placed.iter().any(|p| p.overlaps(&rect)) {
                continue;
            }
            let Some(size) = self.grown_size(&rect) else {
                continue;
            };
            let grows = size != (self.width, self.height);
            let score = self.settings.heuristic.score(&rect);
            let better = match &best {
                None => true,
                Some((best_grows, best_score, _, _)) => {
                    (grows, score) < (*best_grows, *best_score)
                }
            };
            if better {
                best = Some((grows, score, rect, size));
            }
        }

        let (_, _, rect, (w, h)) = best?;
        if (w, h) != (self.width, self.height) {
            tracing::debug!("Atlas grows to {}x{}", w, h);
        }
        self.width = w;
        self.height = h;
        self.placed.push(rect);
        Some(rect)
    }
}

/// Pack `images` into one atlas. `names` label images in error messages.
pub fn pack(images: &[RgbaImage], names: &[String], settings: &PackSettings) -> Result<PackedAtlas> {
    if images.is_empty() {
        bail!("No images to pack");
    }
    let name = |i: usize| names.get(i).map(String::as_str).unwrap_or("<unnamed>");
    let padding = settings.padding;
    let crops: Vec<Rect> = images.iter().map(crop_bounds).collect();

    // Largest first: area plus the square of the longest side
    let mut order: Vec<usize> = (0..images.len()).collect();
    order.sort_by_key(|&i| {
        let c = &crops[i];
        let longest = c.width.max(c.height) as u64;
        std::cmp::Reverse(c.width as u64 * c.height as u64 + longest * longest)
    });

    let padded = |c: &Rect| (c.width + 2 * padding, c.height + 2 * padding);
    let widest = crops.iter().map(|c| padded(c).0).max().unwrap_or(0);
    let tallest = crops.iter().map(|c| padded(c).1).max().unwrap_or(0);
    let (Some(width), Some(height)) = (
        settings.width.next_allowed(widest),
        settings.height.next_allowed(tallest),
    ) else {
        bail!(
            "Images need at least {}x{} pixels, more than the allowed atlas sizes",
            widest,
            tallest
        );
    };

    let mut packer = Packer {
        settings,
        placed: Vec::new(),
        width,
        height,
    };
    let mut slots: Vec<Option<Rect>> = vec![None; images.len()];
    for (position, &i) in order.iter().enumerate() {
        let duplicate = order[..position]
            .iter()
            .find(|&&j| same_pixels(&images[j], &crops[j], &images[i], &crops[i]));
        if let Some(&j) = duplicate {
            tracing::debug!("'{}' reuses the pixels of '{}'", name(i), name(j));
            slots[i] = slots[j];
            continue;
        }
        let (w, h) = padded(&crops[i]);
        let Some(rect) = packer.place(w, h) else {
            bail!("Image '{}' does not fit in any allowed atlas size", name(i));
        };
        slots[i] = Some(rect);
    }

    let mut atlas = RgbaImage::new(packer.width, packer.height);
    let mut placements = Vec::with_capacity(images.len());
    for (i, (image, crop)) in images.iter().zip(&crops).enumerate() {
        let Some(rect) = slots[i] else {
            bail!("Image '{}' was not placed", name(i));
        };
        let atlas_x = rect.x + padding;
        let atlas_y = rect.y + padding;
        let pixels = imageops::crop_imm(image, crop.x, crop.y, crop.width, crop.height).to_image();
        imageops::replace(&mut atlas, &pixels, atlas_x as i64, atlas_y as i64);
        placements.push(Placement {
            atlas_x,
            atlas_y,
            crop_x: crop.x,
            crop_y: crop.y,
            cropped_width: crop.width,
            cropped_height: crop.height,
            original_width: image.width(),
            original_height: image.height(),
        });
    }

    tracing::debug!(
        "Packed {} images into {}x{}",
        images.len(),
        atlas.width(),
        atlas.height()
    );
    Ok(PackedAtlas {
        image: atlas,
        placements,
    })
}
