use clap::{Parser, Subcommand};

/// Annotate agent plans and git diffs in your editor
#[derive(Parser, Debug, Clone)]
#[command(name = "redline", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CliCommand>,

    /// Run the built-in self checks and exit
    #[arg(long, global = true)]
    pub self_test: bool,

    /// Path to config file (default: .redline/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Editor command (default: $EDITOR, then micro)
    #[arg(long, global = true)]
    pub editor: Option<String>,

    /// Give up waiting for the editor after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Annotate a plan: reads a PreToolUse hook event on stdin, or opens PLAN_FILE
    Plan {
        /// Plan file to annotate (file mode); omit to read a hook event from stdin
        plan_file: Option<String>,
    },

    /// Annotate the current git changes and print the annotations as a diff
    Review {
        /// Base ref to diff against (branch, tag, HEAD~3, or an explicit range)
        base_ref: Option<String>,

        /// Remove the cached review repo for this project and branch
        #[arg(long)]
        clean: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_hook_mode() {
        let cli = Cli::parse_from(["redline", "plan"]);
        match cli.command {
            Some(CliCommand::Plan { plan_file }) => assert!(plan_file.is_none()),
            _ => panic!("expected Plan subcommand"),
        }
        assert!(!cli.self_test);
    }

    #[test]
    fn test_parse_plan_file_mode() {
        let cli = Cli::parse_from(["redline", "plan", "docs/plans/foo.md"]);
        match cli.command {
            Some(CliCommand::Plan { plan_file }) => {
                assert_eq!(plan_file.as_deref(), Some("docs/plans/foo.md"));
            }
            _ => panic!("expected Plan subcommand"),
        }
    }

    #[test]
    fn test_parse_review_with_base_ref() {
        let cli = Cli::parse_from(["redline", "review", "HEAD~3"]);
        match cli.command {
            Some(CliCommand::Review { base_ref, clean }) => {
                assert_eq!(base_ref.as_deref(), Some("HEAD~3"));
                assert!(!clean);
            }
            _ => panic!("expected Review subcommand"),
        }
    }

    #[test]
    fn test_parse_review_clean() {
        let cli = Cli::parse_from(["redline", "review", "--clean"]);
        assert!(matches!(
            cli.command,
            Some(CliCommand::Review { clean: true, .. })
        ));
    }

    #[test]
    fn test_self_test_without_command() {
        let cli = Cli::parse_from(["redline", "--self-test"]);
        assert!(cli.self_test);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::parse_from([
            "redline",
            "review",
            "--editor",
            "nvim",
            "--timeout",
            "600",
            "--self-test",
        ]);
        assert_eq!(cli.editor.as_deref(), Some("nvim"));
        assert_eq!(cli.timeout, Some(600));
        assert!(cli.self_test);
    }
}
