use std::collections::BTreeMap;

/// Replace `${NAME}` and `$NAME` with values from `variables`, then from the process
/// environment.
pub fn expand_variables(input: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = input.to_string();
    let mut apply = |key: &str, value: &str| {
        out = out.replace(&format!("${{{}}}", key), value);
        out = out.replace(&format!("${}", key), value);
    };

    // Longest names first so `$INST_DIR` does not eat `$INST_DIRNAME`.
    let mut keys: Vec<&String> = variables.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
    for key in keys {
        apply(key, &variables[key]);
    }

    let mut env: Vec<(String, String)> = std::env::vars().collect();
    env.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));
    for (key, value) in env {
        apply(&key, &value);
    }
    out
}

/// Split a command line into arguments, honoring quotes and backslash escapes.
pub fn split_args(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(ch) = chars.next() {
        match (ch, quote) {
            ('\\', q) if q != Some('\'') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_arg = true;
                }
            }
            (c, Some(q)) if c == q => quote = None,
            (c, Some(_)) => current.push(c),
            ('"', None) | ('\'', None) => {
                quote = Some(ch);
                in_arg = true;
            }
            (c, None) if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            (c, None) => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_both_variable_forms() {
        let mut vars = BTreeMap::new();
        vars.insert("INST_NAME".to_string(), "Survival".to_string());
        vars.insert("INST_DIR".to_string(), "/inst".to_string());
        vars.insert("INST_DIRNAME".to_string(), "survival".to_string());
        assert_eq!(
            expand_variables("echo ${INST_NAME} $INST_DIR $INST_DIRNAME", &vars),
            "echo Survival /inst survival"
        );
    }

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(
            split_args(r#"prime-run "my wrapper" 'a b' c\ d"#),
            vec!["prime-run", "my wrapper", "a b", "c d"]
        );
        assert_eq!(split_args(r#"empty "" end"#), vec!["empty", "", "end"]);
        assert!(split_args("   ").is_empty());
    }
}
