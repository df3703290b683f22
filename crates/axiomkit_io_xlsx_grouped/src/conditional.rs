//! Palette conditional formatting for the result column.

use crate::conf::derive_result_format;
use crate::layout::derive_layout_height;
use crate::spec::{SpecConditionalRule, SpecLayoutPlan};
use crate::util::{derive_column_letter, derive_column_range_ref};

/// Plan one formula rule per palette entry over the result column.
///
/// Rule `i` (1-based) colors cells equal to `i` with palette entry `i - 1`.
/// The range starts below the header and ends on the last layout row; an
/// empty layout yields no rules.
pub fn plan_conditional_rules(
    layout: &SpecLayoutPlan,
    col_idx_result: usize,
    palette: &[String],
) -> Vec<SpecConditionalRule> {
    let n_height = derive_layout_height(
        layout.n_rows_data(),
        layout.groups.len(),
        layout.n_blank_rows,
    );
    if n_height < 2 {
        log::debug!("No data rows; skipping result conditional formatting.");
        return vec![];
    }

    let row_idx_first = 1;
    let row_idx_last = n_height - 1;
    let c_col = derive_column_letter(col_idx_result);
    let range_ref = derive_column_range_ref(col_idx_result, row_idx_first, row_idx_last);

    palette
        .iter()
        .enumerate()
        .map(|(n_idx, color)| SpecConditionalRule {
            col_idx: col_idx_result,
            row_idx_first,
            row_idx_last,
            range_ref: range_ref.clone(),
            criteria: format!("=${c_col}{}={}", row_idx_first + 1, n_idx + 1),
            format: derive_result_format(color),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::conf::derive_default_result_palette;
    use crate::layout::plan_layout;
    use crate::source::SpecTable;
    use crate::spec::{EnumCellValue, EnumGroupNameRule};

    fn derive_layout(keys: &[&str], n_blank_rows: usize) -> SpecLayoutPlan {
        let table = SpecTable::new(
            vec!["group".to_string(), "result".to_string()],
            keys.iter()
                .map(|key| vec![EnumCellValue::from(*key), EnumCellValue::None])
                .collect(),
        )
        .expect("valid table");
        plan_layout(&table, 0, n_blank_rows, EnumGroupNameRule::Number).expect("plan")
    }

    #[test]
    fn rules_cover_header_to_last_layout_row() {
        let layout = derive_layout(&["X", "X", "Y"], 3);
        let l_rules = plan_conditional_rules(&layout, 4, &derive_default_result_palette());

        assert_eq!(l_rules.len(), 8);
        assert_eq!(l_rules[0].range_ref, "E2:E12");
        assert_eq!(l_rules[0].criteria, "=$E2=1");
        assert_eq!(l_rules[7].criteria, "=$E2=8");
        assert_eq!(l_rules[0].format.bg_color.as_deref(), Some("#006400"));
        assert_eq!(l_rules[7].format.bg_color.as_deref(), Some("#008080"));
        assert_eq!(l_rules[0].format.font_color.as_deref(), Some("#FFFFFF"));
        assert_eq!(l_rules[0].format.bold, Some(true));
        assert_eq!(l_rules[0].format.border, Some(1));
    }

    #[test]
    fn range_end_tracks_layout_exactly() {
        for (keys, n_blank_rows) in [
            (vec!["a"], 0usize),
            (vec!["a", "b"], 0),
            (vec!["a", "b", "a", "c"], 2),
            (vec!["a", "b", "c", "d", "e", "f"], 3),
        ] {
            let layout = derive_layout(&keys, n_blank_rows);
            let l_rules = plan_conditional_rules(&layout, 1, &derive_default_result_palette());

            // 1-based end row: data + groups * (1 + padding) + 1
            let n_row_end_1based = keys.len() + layout.groups.len() * (1 + n_blank_rows) + 1;
            for rule in &l_rules {
                assert_eq!(rule.row_idx_first, 1);
                assert_eq!(rule.row_idx_last, layout.row_idx_last());
                assert_eq!(rule.row_idx_last + 1, n_row_end_1based);
                assert_eq!(rule.range_ref, format!("B2:B{n_row_end_1based}"));
            }
        }
    }

    #[test]
    fn empty_layout_has_no_rules() {
        let layout = derive_layout(&[], 3);
        assert!(plan_conditional_rules(&layout, 0, &derive_default_result_palette()).is_empty());
    }

    #[test]
    fn custom_palette_sets_rule_count() {
        let layout = derive_layout(&["a"], 1);
        let palette = vec!["#111111".to_string(), "#222222".to_string()];
        let l_rules = plan_conditional_rules(&layout, 0, &palette);
        assert_eq!(l_rules.len(), 2);
        assert_eq!(l_rules[1].criteria, "=$A2=2");
    }
}
