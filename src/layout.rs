use itertools::Itertools;
use crate::models::{Field, FieldID};

/// Fields whose tops are within this many percentage points read as one row.
pub const ROW_TOLERANCE: f64 = 5.0;

/// Reports whether the rectangle lies on the page. Does not clamp.
pub fn validate_field_placement(position_x: f64, position_y: f64, width: f64, height: f64) -> bool {
    position_x >= 0.0
        && position_y >= 0.0
        && position_x + width <= 100.0
        && position_y + height <= 100.0
}

pub fn validate_field_size(width: f64, height: f64) -> bool {
    width > 0.0 && width <= 100.0 && height > 0.0 && height <= 100.0
}

/// Axis-aligned overlap on the same page. Fields that only share an edge do
/// not overlap.
pub fn do_fields_overlap(a: &Field, b: &Field) -> bool {
    if a.page_number != b.page_number {
        return false;
    }

    !(a.position_x + a.width <= b.position_x
        || b.position_x + b.width <= a.position_x
        || a.position_y + a.height <= b.position_y
        || b.position_y + b.height <= a.position_y)
}

/// Every overlapping pair. Informational: nothing rejects a placement for
/// overlapping another field.
pub fn find_overlaps(fields: &[Field]) -> Vec<(FieldID, FieldID)> {
    fields.iter()
        .tuple_combinations()
        .filter(|(a, b)| do_fields_overlap(a, b))
        .map(|(a, b)| (a.id, b.id))
        .collect()
}

/// Reading order: page, then row, then left to right within a row. A row
/// starts at its topmost field and takes in every field whose top is within
/// [`ROW_TOLERANCE`] of it.
pub fn sort_fields_by_position(fields: &[Field]) -> Vec<Field> {
    let mut by_top = fields.iter().collect::<Vec<_>>();
    by_top.sort_by(|a, b| {
        a.page_number.cmp(&b.page_number)
            .then(a.position_y.total_cmp(&b.position_y))
            .then(a.position_x.total_cmp(&b.position_x))
            .then(a.id.cmp(&b.id))
    });

    let mut ordered = Vec::with_capacity(fields.len());
    let pages = by_top.into_iter().group_by(|f| f.page_number);
    for (_, page) in &pages {
        let mut row = vec![];
        let mut row_top = None;
        for field in page {
            match row_top {
                Some(top) if field.position_y - top <= ROW_TOLERANCE => {}
                _ => {
                    flush_row(&mut row, &mut ordered);
                    row_top = Some(field.position_y);
                }
            }
            row.push(field);
        }
        flush_row(&mut row, &mut ordered);
    }
    ordered
}

fn flush_row(row: &mut Vec<&Field>, ordered: &mut Vec<Field>) {
    row.sort_by(|a, b| {
        a.position_x.total_cmp(&b.position_x)
            .then(a.position_y.total_cmp(&b.position_y))
            .then(a.id.cmp(&b.id))
    });
    ordered.extend(row.drain(..).cloned());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentID, FieldType};

    fn field(page: u32, x: f64, y: f64, w: f64, h: f64) -> Field {
        Field {
            id: FieldID::new(),
            document_id: DocumentID::new(),
            field_type: FieldType::Text,
            page_number: page,
            position_x: x,
            position_y: y,
            width: w,
            height: h,
            signer_id: None,
            value: None,
            is_required: true,
        }
    }

    #[test]
    fn placement_predicate() {
        assert!(validate_field_placement(0.0, 0.0, 100.0, 100.0));
        assert!(validate_field_placement(75.0, 90.0, 25.0, 10.0));
        assert!(!validate_field_placement(-0.1, 0.0, 10.0, 10.0));
        assert!(!validate_field_placement(80.0, 0.0, 25.0, 10.0));
        assert!(!validate_field_placement(0.0, 95.0, 25.0, 10.0));
        assert!(!validate_field_placement(75.0000000005, 0.0, 25.0, 10.0));
    }

    #[test]
    fn size_predicate() {
        assert!(validate_field_size(25.0, 10.0));
        assert!(validate_field_size(100.0, 100.0));
        assert!(!validate_field_size(0.0, 10.0));
        assert!(!validate_field_size(10.0, 100.5));
    }

    #[test]
    fn overlap_is_symmetric() {
        let fields = [
            field(1, 10.0, 10.0, 25.0, 10.0),
            field(1, 30.0, 15.0, 25.0, 10.0),
            field(1, 35.0, 10.0, 10.0, 6.0),
            field(1, 60.0, 60.0, 10.0, 10.0),
            field(1, 70.0, 60.0, 10.0, 10.0),
        ];
        for a in &fields {
            for b in &fields {
                assert_eq!(do_fields_overlap(a, b), do_fields_overlap(b, a));
            }
        }
        assert!(do_fields_overlap(&fields[0], &fields[1]));
        assert!(do_fields_overlap(&fields[1], &fields[2]));
        assert!(!do_fields_overlap(&fields[0], &fields[2]));
        // shared edge only
        assert!(!do_fields_overlap(&fields[3], &fields[4]));
    }

    #[test]
    fn overlap_never_crosses_pages() {
        let a = field(1, 10.0, 10.0, 50.0, 50.0);
        let b = field(2, 10.0, 10.0, 50.0, 50.0);
        assert!(!do_fields_overlap(&a, &b));
        assert!(!do_fields_overlap(&b, &a));
    }

    #[test]
    fn overlaps_are_reported_pairwise() {
        let fields = vec![
            field(1, 10.0, 10.0, 25.0, 10.0),
            field(1, 20.0, 12.0, 25.0, 10.0),
            field(2, 20.0, 12.0, 25.0, 10.0),
        ];
        assert_eq!(find_overlaps(&fields), vec![(fields[0].id, fields[1].id)]);
    }

    #[test]
    fn sort_reads_rows_left_to_right() {
        let a = field(1, 60.0, 20.0, 10.0, 5.0);
        let b = field(1, 10.0, 23.0, 10.0, 5.0);
        let c = field(1, 35.0, 21.5, 10.0, 5.0);
        let d = field(1, 5.0, 40.0, 10.0, 5.0);
        let e = field(2, 0.0, 0.0, 10.0, 5.0);

        let sorted = sort_fields_by_position(&[e.clone(), d.clone(), a.clone(), c.clone(), b.clone()]);
        let ids = sorted.iter().map(|f| f.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![b.id, c.id, a.id, d.id, e.id]);
    }

    #[test]
    fn sort_is_deterministic() {
        let fields = vec![
            field(2, 50.0, 50.0, 10.0, 5.0),
            field(1, 40.0, 12.0, 10.0, 5.0),
            field(1, 10.0, 10.0, 10.0, 5.0),
            field(1, 10.0, 80.0, 10.0, 5.0),
            field(1, 10.0, 10.0, 10.0, 5.0),
        ];
        let mut reversed = fields.clone();
        reversed.reverse();

        let once = sort_fields_by_position(&fields);
        assert_eq!(once, sort_fields_by_position(&fields));
        assert_eq!(once, sort_fields_by_position(&reversed));
        assert_eq!(once, sort_fields_by_position(&once));
    }

    #[test]
    fn rows_further_apart_than_tolerance_sort_by_top() {
        let lower_left = field(1, 5.0, 30.0, 10.0, 5.0);
        let upper_right = field(1, 80.0, 24.0, 10.0, 5.0);
        let sorted = sort_fields_by_position(&[lower_left.clone(), upper_right.clone()]);
        assert_eq!(sorted[0].id, upper_right.id);
        assert_eq!(sorted[1].id, lower_left.id);
    }
}
