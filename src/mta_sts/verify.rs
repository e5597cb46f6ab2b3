use super::{Mode, MxPattern, Policy};

impl Policy {
    /// Whether an MX hostname is authorized by one of the policy patterns.
    ///
    /// A `*.` pattern matches exactly one additional label: the remainder of
    /// the candidate after its first label must equal the pattern suffix.
    pub fn matches(&self, mx_host: &str) -> bool {
        let mx_host = mx_host.trim_end_matches('.');

        for pattern in &self.mx {
            match pattern {
                MxPattern::Equals(host) => {
                    if host == mx_host {
                        return true;
                    }
                }
                MxPattern::Wildcard(suffix) => {
                    if let Some((_, remainder)) = mx_host.split_once('.') {
                        if remainder == suffix {
                            return true;
                        }
                    }
                }
            }
        }

        false
    }

    pub fn enforce(&self) -> bool {
        self.mode == Mode::Enforce
    }
}
