use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multimodal Gemini chat: web UI plus one-shot commands
#[derive(Debug, Parser)]
#[command(name = "gemini-chat")]
#[command(version)]
#[command(about = "Multimodal Gemini chat", long_about = None)]
pub struct Args {
    /// Text model for chat and document summaries
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Provider (default: config/provider or "google")
    #[arg(long = "provider", global = true)]
    pub provider: Option<String>,

    /// Config file (default: <config dir>/config.toml)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the browser UI (default)
    Serve {
        /// Listen address, e.g. 127.0.0.1:7860
        #[arg(long = "bind", value_name = "ADDR")]
        bind: Option<String>,

        /// Answer chat messages in one piece instead of streaming
        #[arg(long = "no-stream")]
        no_stream: bool,
    },

    /// Send one chat message and stream the answer to stdout
    Ask {
        #[arg(value_name = "PROMPT", required = true)]
        prompt: Vec<String>,
    },

    /// Summarize a document (.pdf, .docx, .xlsx, .pptx, .txt)
    Summarize {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Describe an image
    Describe {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Generate an image, or edit one with --image
    Generate {
        #[arg(value_name = "PROMPT", required = true)]
        prompt: Vec<String>,

        /// Source image to edit
        #[arg(long = "image", value_name = "FILE")]
        image: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let args = Args::try_parse_from(["gemini-chat"]).unwrap();
        assert!(args.cmd.is_none());
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let args =
            Args::try_parse_from(["gemini-chat", "ask", "xin", "chào", "--provider", "stub"]).unwrap();
        assert_eq!(args.provider.as_deref(), Some("stub"));
        match args.cmd {
            Some(Command::Ask { prompt }) => assert_eq!(prompt, ["xin", "chào"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn generate_takes_optional_source_image() {
        let args =
            Args::try_parse_from(["gemini-chat", "generate", "a", "cat", "--image", "in.png"]).unwrap();
        match args.cmd {
            Some(Command::Generate { prompt, image }) => {
                assert_eq!(prompt.join(" "), "a cat");
                assert_eq!(image, Some(PathBuf::from("in.png")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ask_requires_a_prompt() {
        assert!(Args::try_parse_from(["gemini-chat", "ask"]).is_err());
    }
}
