//! CLI parsing tests for replay command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use crate::commands::query::ExecuteKind;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "replay",
        test_name: test_replay_requires_sql,
        required_arg: "--sql",
    }

    crate::cli_option_test! {
        command: "replay",
        variant: Replay,
        test_name: test_replay_with_sql,
        args: ["--sql", "SELECT 1"],
        field: sql,
        expected: "SELECT 1",
    }

    crate::cli_option_test! {
        command: "replay",
        variant: Replay,
        test_name: test_replay_with_short_kind,
        args: ["-s", "SELECT 1", "-k", "scalar"],
        field: kind,
        expected: ExecuteKind::Scalar,
    }

    crate::cli_error_test! {
        command: "replay",
        test_name: test_replay_has_no_db_flag,
        args: ["--sql", "SELECT 1", "--db", "app.db"],
    }

    #[rstest]
    fn test_replay_accepts_global_cache() {
        let args = Args::try_parse_from(["sql_replay", "replay", "--sql", "SELECT 1", "--cache", "c.json"]).unwrap();
        assert_eq!(args.cache, Some(std::path::PathBuf::from("c.json")));
    }
}
