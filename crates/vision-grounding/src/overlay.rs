use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
};
use imageproc::rect::Rect;

use crate::models::{palette_color, MarkedElement, MARK_DIAMETER};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL_STRIP_HEIGHT: i32 = 14;

/// Draws bounding boxes, numbered mark circles, and (optionally) a
/// colored label strip for every marked element, in place.
pub fn draw_marks(image: &mut RgbaImage, elements: &[MarkedElement], show_boxes: bool, show_labels: bool) {
    for element in elements {
        let (r, g, b) = palette_color(element.mark_id);
        let color = Rgba([r, g, b, 255]);
        let b2 = &element.bounding_box;

        if show_boxes && b2.width > 0 && b2.height > 0 {
            draw_hollow_rect_mut(
                image,
                Rect::at(b2.x, b2.y).of_size(b2.width as u32, b2.height as u32),
                color,
            );
        }

        let radius = (MARK_DIAMETER / 2) as i32;
        let mark_center_x = b2.x + radius;
        let mark_center_y = if b2.y > MARK_DIAMETER as i32 {
            b2.y - radius
        } else {
            b2.y + radius
        };

        draw_filled_circle_mut(image, (mark_center_x, mark_center_y), radius, color);
        draw_hollow_circle_mut(image, (mark_center_x, mark_center_y), radius, WHITE);
        draw_digits(image, element.mark_id, mark_center_x, mark_center_y);

        if show_labels {
            let strip_y = b2.y + b2.height;
            let strip_width = (b2.width.max(40)) as u32;
            draw_filled_rect_mut(
                image,
                Rect::at(b2.x, strip_y).of_size(strip_width, LABEL_STRIP_HEIGHT as u32),
                color,
            );
        }
    }
}

/// 3x5 bitmap digits, scaled up, rendered in white at the mark center.
/// No bundled font asset ships with this crate, so mark numbers are
/// rasterized directly rather than shaped text.
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b001, 0b001, 0b001], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

fn draw_digits(image: &mut RgbaImage, mark_id: u32, cx: i32, cy: i32) {
    let digits: Vec<u32> = mark_id
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    let pixel = 2i32;
    let glyph_width = 3 * pixel;
    let total_width = digits.len() as i32 * (glyph_width + pixel);
    let mut x = cx - total_width / 2;
    let y = cy - (5 * pixel) / 2;

    for digit in digits {
        let rows = DIGIT_GLYPHS[digit as usize];
        for (row_idx, row) in rows.iter().enumerate() {
            for col in 0..3 {
                if (row >> (2 - col)) & 1 == 1 {
                    draw_filled_rect_mut(
                        image,
                        Rect::at(x + col * pixel, y + row_idx as i32 * pixel).of_size(pixel as u32, pixel as u32),
                        WHITE,
                    );
                }
            }
        }
        x += glyph_width + pixel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    #[test]
    fn draw_marks_does_not_panic_on_edge_of_image() {
        let mut image = RgbaImage::new(50, 50);
        let elements = vec![MarkedElement {
            mark_id: 1,
            element_type: "button".into(),
            bounding_box: BoundingBox { x: 0, y: 0, width: 30, height: 15 },
            center: (15, 7),
            text: None,
            confidence: 0.9,
        }];
        draw_marks(&mut image, &elements, true, true);
    }

    #[test]
    fn draw_marks_handles_empty_elements() {
        let mut image = RgbaImage::new(10, 10);
        draw_marks(&mut image, &[], true, true);
    }
}
