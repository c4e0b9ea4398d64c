//! Conversion between pointer coordinates on a rendered page and the
//! page-size independent percent space fields are stored in.
//!
//! (0, 0) is the top-left corner of the page and (100, 100) the bottom-right.
//! Everything here is total: out-of-range input is clamped, never rejected.

use crate::models::FieldType;

/// Drag rectangles smaller than this fall back to the field type's default size.
pub const MIN_DRAG_WIDTH_PX: f64 = 50.0;
pub const MIN_DRAG_HEIGHT_PX: f64 = 30.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub position_x: f64,
    pub position_y: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldRect {
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Client coordinates reported by a pointer or drag event.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointerPosition {
    pub client_x: f64,
    pub client_y: f64,
}

impl PointerPosition {
    pub fn new(client_x: f64, client_y: f64) -> Self {
        Self { client_x, client_y }
    }
}

/// Bounding client rectangle of the element a page is rendered into.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    fn relative(&self, pointer: PointerPosition) -> (f64, f64) {
        (pointer.client_x - self.left, pointer.client_y - self.top)
    }

    fn relative_clamped(&self, pointer: PointerPosition) -> (f64, f64) {
        let (x, y) = self.relative(pointer);
        (x.max(0.0).min(self.width), y.max(0.0).min(self.height))
    }
}

/// Size used whenever a placement gesture does not size the field itself.
/// Tuned for A4-proportioned pages.
pub fn default_dimensions(field_type: FieldType) -> (f64, f64) {
    match field_type {
        FieldType::Signature => (25.0, 10.0),
        FieldType::Initials => (12.0, 10.0),
        FieldType::Date => (18.0, 6.0),
        FieldType::Text => (30.0, 6.0),
    }
}

pub fn pixel_to_percent(pixel_value: f64, container_size: f64) -> f64 {
    pixel_value / container_size * 100.0
}

pub fn percent_to_pixel(percent: f64, container_size: f64) -> f64 {
    percent / 100.0 * container_size
}

/// Moves the top-left corner so a `width` x `height` rectangle fits on the page.
pub fn clamp_field_position(position_x: f64, position_y: f64, width: f64, height: f64) -> Position {
    Position {
        position_x: position_x.min(100.0 - width).max(0.0),
        position_y: position_y.min(100.0 - height).max(0.0),
    }
}

/// Top-left corner that puts a field of the given percent size centred under
/// the pointer, clamped onto the page.
pub fn calculate_field_position_from_event(
    pointer: PointerPosition, container: ContainerRect, field_width_percent: f64, field_height_percent: f64,
) -> Position {
    let (x, y) = container.relative(pointer);
    let centre_x = pixel_to_percent(x, container.width);
    let centre_y = pixel_to_percent(y, container.height);

    clamp_field_position(
        centre_x - field_width_percent / 2.0,
        centre_y - field_height_percent / 2.0,
        field_width_percent,
        field_height_percent,
    )
}

/// Click-to-place and toolbar drops both land here: default size, centred.
pub fn field_rect_from_click(pointer: PointerPosition, container: ContainerRect, field_type: FieldType) -> FieldRect {
    let (width, height) = default_dimensions(field_type);
    let position = calculate_field_position_from_event(pointer, container, width, height);
    FieldRect {
        position_x: position.position_x,
        position_y: position.position_y,
        width,
        height,
    }
}

/// Sizes a field from a manual drag gesture. Both ends are clamped into the
/// container first; degenerate drags get the type's default size anchored at
/// the drag's top-left corner.
pub fn field_rect_from_drag(
    start: PointerPosition, end: PointerPosition, container: ContainerRect, field_type: FieldType,
) -> FieldRect {
    let (start_x, start_y) = container.relative_clamped(start);
    let (end_x, end_y) = container.relative_clamped(end);

    let left = pixel_to_percent(start_x.min(end_x), container.width);
    let top = pixel_to_percent(start_y.min(end_y), container.height);
    let width_px = (end_x - start_x).abs();
    let height_px = (end_y - start_y).abs();

    let (width, height) = if width_px < MIN_DRAG_WIDTH_PX || height_px < MIN_DRAG_HEIGHT_PX {
        default_dimensions(field_type)
    } else {
        (
            pixel_to_percent(width_px, container.width).min(100.0),
            pixel_to_percent(height_px, container.height).min(100.0),
        )
    };

    let position = clamp_field_position(left, top, width, height);
    FieldRect {
        position_x: position.position_x,
        position_y: position.position_y,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{} != {}", a, b);
    }

    #[test]
    fn percent_round_trip() {
        for size in [1.0, 37.5, 612.0, 793.7, 1000.0, 4096.0] {
            for p in [0.0, 0.1, 12.5, 33.333, 50.0, 99.99, 100.0] {
                assert_close(pixel_to_percent(percent_to_pixel(p, size), size), p);
            }
        }
    }

    #[test]
    fn clamp_keeps_field_on_page() {
        let values = [-250.0, -2.5, 0.0, 10.0, 74.5, 90.0, 100.0, 512.0];
        let sizes = [0.25, 6.0, 10.0, 25.0, 50.0, 100.0];
        for x in values {
            for y in values {
                for w in sizes {
                    for h in sizes {
                        let p = clamp_field_position(x, y, w, h);
                        assert!(p.position_x >= 0.0 && p.position_y >= 0.0);
                        assert!(p.position_x + w <= 100.0 && p.position_y + h <= 100.0);
                    }
                }
            }
        }
    }

    #[test]
    fn clamp_leaves_valid_positions_alone() {
        assert_eq!(clamp_field_position(20.0, 30.0, 25.0, 10.0), Position { position_x: 20.0, position_y: 30.0 });
    }

    #[test]
    fn click_centres_field_and_clamps() {
        let container = ContainerRect::new(0.0, 0.0, 1000.0, 800.0);
        let rect = field_rect_from_click(PointerPosition::new(100.0, 100.0), container, FieldType::Signature);
        assert_close(rect.position_x, 0.0);
        assert_close(rect.position_y, 7.5);
        assert_eq!((rect.width, rect.height), (25.0, 10.0));
    }

    #[test]
    fn click_is_relative_to_container() {
        let container = ContainerRect::new(200.0, 50.0, 1000.0, 1000.0);
        let pos = calculate_field_position_from_event(PointerPosition::new(700.0, 550.0), container, 30.0, 6.0);
        assert_close(pos.position_x, 35.0);
        assert_close(pos.position_y, 47.0);
    }

    #[test]
    fn click_near_bottom_right_is_pulled_back() {
        let container = ContainerRect::new(0.0, 0.0, 1000.0, 1000.0);
        let pos = calculate_field_position_from_event(PointerPosition::new(995.0, 995.0), container, 18.0, 6.0);
        assert_close(pos.position_x, 82.0);
        assert_close(pos.position_y, 94.0);
    }

    #[test]
    fn small_drag_uses_default_dimensions() {
        let container = ContainerRect::new(0.0, 0.0, 1000.0, 1000.0);
        let rect = field_rect_from_drag(
            PointerPosition::new(100.0, 100.0), PointerPosition::new(120.0, 110.0), container, FieldType::Signature,
        );
        assert_eq!((rect.width, rect.height), (25.0, 10.0));
        assert_close(rect.position_x, 10.0);
        assert_close(rect.position_y, 10.0);
    }

    #[test]
    fn drag_sizes_field_in_any_direction() {
        let container = ContainerRect::new(0.0, 0.0, 1000.0, 500.0);
        let rect = field_rect_from_drag(
            PointerPosition::new(600.0, 300.0), PointerPosition::new(200.0, 250.0), container, FieldType::Text,
        );
        assert_close(rect.position_x, 20.0);
        assert_close(rect.position_y, 50.0);
        assert_close(rect.width, 40.0);
        assert_close(rect.height, 10.0);
    }

    #[test]
    fn drag_past_container_edge_is_clipped() {
        let container = ContainerRect::new(0.0, 0.0, 1000.0, 1000.0);
        let rect = field_rect_from_drag(
            PointerPosition::new(800.0, 900.0), PointerPosition::new(1400.0, 1300.0), container, FieldType::Text,
        );
        assert_close(rect.position_x + rect.width, 100.0);
        assert_close(rect.position_y + rect.height, 100.0);
    }

    #[test]
    fn default_dimensions_per_type() {
        assert_eq!(default_dimensions(FieldType::Signature), (25.0, 10.0));
        assert_eq!(default_dimensions(FieldType::Initials), (12.0, 10.0));
        assert_eq!(default_dimensions(FieldType::Date), (18.0, 6.0));
        assert_eq!(default_dimensions(FieldType::Text), (30.0, 6.0));
    }
}
