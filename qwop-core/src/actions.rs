use crate::controls::ControlState;
use crate::error::SimError;

const fn keys(q: bool, w: bool, o: bool, p: bool) -> ControlState {
    ControlState::new(q, w, o, p)
}

/// Every subset of {q, w, o, p} by size, then lexicographically.
pub const FULL_ACTIONS: [ControlState; 16] = [
    keys(false, false, false, false),
    keys(true, false, false, false),
    keys(false, true, false, false),
    keys(false, false, true, false),
    keys(false, false, false, true),
    keys(true, true, false, false),
    keys(true, false, true, false),
    keys(true, false, false, true),
    keys(false, true, true, false),
    keys(false, true, false, true),
    keys(false, false, true, true),
    keys(true, true, true, false),
    keys(true, true, false, true),
    keys(true, false, true, true),
    keys(false, true, true, true),
    keys(true, true, true, true),
];

/// The full set without QO, WP, QWO, QWP, QOP, WOP and QWOP.
pub const REDUCED_ACTIONS: [ControlState; 9] = [
    keys(false, false, false, false),
    keys(true, false, false, false),
    keys(false, true, false, false),
    keys(false, false, true, false),
    keys(false, false, false, true),
    keys(true, true, false, false),
    keys(true, false, false, true),
    keys(false, true, true, false),
    keys(false, false, true, true),
];

/// Maps discrete action indices to key states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionMapper {
    reduced: bool,
}

impl ActionMapper {
    pub fn new(reduced: bool) -> Self {
        Self { reduced }
    }

    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    pub fn table(&self) -> &'static [ControlState] {
        if self.reduced {
            &REDUCED_ACTIONS
        } else {
            &FULL_ACTIONS
        }
    }

    pub fn num_actions(&self) -> usize {
        self.table().len()
    }

    pub fn keys_for(&self, index: usize) -> Result<ControlState, SimError> {
        self.table()
            .get(index)
            .copied()
            .ok_or(SimError::ActionOutOfRange {
                index,
                action_count: self.num_actions(),
            })
    }

    /// Overwrites all four keys of `controls` with the action's keys.
    pub fn apply_action(&self, index: usize, controls: &mut ControlState) -> Result<(), SimError> {
        *controls = self.keys_for(index)?;
        Ok(())
    }

    /// Exact match only; combinations outside the action set map to `None`.
    pub fn action_from_keys(&self, keys: ControlState) -> Option<usize> {
        self.table().iter().position(|candidate| *candidate == keys)
    }

    /// Parses a label such as "QP", "qw" or "none".
    pub fn action_from_label(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        let mut keys = ControlState::default();
        if !label.eq_ignore_ascii_case("none") {
            for c in label.chars() {
                if !keys.key_down(c) {
                    return None;
                }
            }
        }
        self.action_from_keys(keys)
    }

    pub fn action_name(&self, index: usize) -> &'static str {
        match self.table().get(index) {
            Some(keys) => keys.label(),
            None => "invalid",
        }
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        (0..self.num_actions()).map(|i| self.action_name(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_set_is_every_combination_once() {
        let mapper = ActionMapper::new(false);
        assert_eq!(mapper.num_actions(), 16);
        for (i, keys) in FULL_ACTIONS.iter().enumerate() {
            assert_eq!(mapper.action_from_keys(*keys), Some(i));
        }
        assert_eq!(
            mapper.action_names(),
            vec![
                "none", "Q", "W", "O", "P", "QW", "QO", "QP", "WO", "WP", "OP", "QWO", "QWP",
                "QOP", "WOP", "QWOP"
            ]
        );
    }

    #[test]
    fn reduced_set_is_strict_subset_without_the_seven() {
        let full = ActionMapper::new(false);
        let reduced = ActionMapper::new(true);
        assert_eq!(reduced.num_actions(), 9);
        for keys in REDUCED_ACTIONS {
            assert!(full.action_from_keys(keys).is_some());
        }
        for label in ["QO", "WP", "QWO", "QWP", "QOP", "WOP", "QWOP"] {
            assert!(full.action_from_label(label).is_some());
            assert_eq!(reduced.action_from_label(label), None, "{label}");
        }
        assert_eq!(
            reduced.action_names(),
            vec!["none", "Q", "W", "O", "P", "QW", "QP", "WO", "OP"]
        );
    }

    #[test]
    fn reduced_action_zero_is_no_keys() {
        let reduced = ActionMapper::new(true);
        assert_eq!(reduced.keys_for(0), Ok(ControlState::default()));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let reduced = ActionMapper::new(true);
        let mut controls = ControlState::new(true, false, false, false);
        assert_eq!(
            reduced.apply_action(9, &mut controls),
            Err(SimError::ActionOutOfRange {
                index: 9,
                action_count: 9
            })
        );
        assert_eq!(controls, ControlState::new(true, false, false, false));
        assert_eq!(reduced.action_name(42), "invalid");
    }

    #[test]
    fn apply_overwrites_every_key() {
        let mapper = ActionMapper::new(false);
        let mut controls = ControlState::new(true, true, true, true);
        mapper.apply_action(4, &mut controls).unwrap();
        assert_eq!(controls, ControlState::new(false, false, false, true));
    }

    #[test]
    fn labels_parse_case_insensitively() {
        let mapper = ActionMapper::new(false);
        assert_eq!(mapper.action_from_label("qp"), Some(7));
        assert_eq!(mapper.action_from_label("none"), Some(0));
        assert_eq!(mapper.action_from_label(""), Some(0));
        assert_eq!(mapper.action_from_label("QX"), None);
    }
}
