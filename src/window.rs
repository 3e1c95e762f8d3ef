/// Absolute stream offsets `[min, max)`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Window {
    pub min: u64,
    pub max: u64,
}

impl Window {
    pub fn starting_at(min: u64, size: u32) -> Self {
        Self {
            min,
            max: min + size as u64,
        }
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.min <= offset && offset < self.max
    }

    /// Moves the window so that it ends at `max`, if that is further ahead.
    pub fn slide_to(&mut self, max: u64, size: u32) -> bool {
        if max <= self.max {
            return false;
        }
        self.max = max;
        self.min = max.saturating_sub(size as u64);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let window = Window::starting_at(1019, 1000);
        assert!(!window.contains(1018));
        assert!(window.contains(1019));
        assert!(window.contains(2018));
        assert!(!window.contains(2019));
    }

    #[test]
    fn slide_only_moves_forward() {
        let mut window = Window::starting_at(0, 1000);
        assert!(!window.slide_to(1000, 1000));
        assert!(window.slide_to(3057, 1000));
        assert_eq!(window, Window { min: 2057, max: 3057 });
        assert!(!window.slide_to(2038, 1000));
        assert_eq!(window.max, 3057);
    }
}
