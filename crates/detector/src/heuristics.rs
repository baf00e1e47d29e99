#![forbid(unsafe_code)]

/// Office applications that should not normally spawn interpreters.
pub const SUSPICIOUS_PARENTS: [&str; 4] = ["winword.exe", "excel.exe", "powerpnt.exe", "outlook.exe"];

/// Script hosts and shells commonly launched by malicious documents.
pub const SUSPICIOUS_CHILDREN: [&str; 5] = [
    "powershell.exe",
    "cmd.exe",
    "wscript.exe",
    "cscript.exe",
    "mshta.exe",
];

/// Whether a parent/child spawn matches the office → interpreter table.
/// Names are compared exactly as the platform reports them.
pub fn is_suspicious(parent_name: &str, child_name: &str) -> bool {
    SUSPICIOUS_PARENTS.contains(&parent_name) && SUSPICIOUS_CHILDREN.contains(&child_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn office_spawning_shell_is_suspicious() {
        assert!(is_suspicious("winword.exe", "powershell.exe"));
        assert!(is_suspicious("outlook.exe", "mshta.exe"));
        assert!(!is_suspicious("explorer.exe", "cmd.exe"));
        assert!(!is_suspicious("excel.exe", "notepad.exe"));
        assert!(!is_suspicious("cmd.exe", "winword.exe"));
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(SUSPICIOUS_PARENTS.to_vec()).prop_map(str::to_owned),
            prop::sample::select(SUSPICIOUS_CHILDREN.to_vec()).prop_map(str::to_owned),
            "[a-zA-Z.]{1,16}",
        ]
    }

    proptest! {
        #[test]
        fn matches_table_membership(parent in name_strategy(), child in name_strategy()) {
            let expected = SUSPICIOUS_PARENTS.contains(&parent.as_str())
                && SUSPICIOUS_CHILDREN.contains(&child.as_str());
            prop_assert_eq!(is_suspicious(&parent, &child), expected);
        }
    }
}
