use std::path::PathBuf;

use clap::{Parser, Subcommand};

use timeline_client::TimelineClient;

#[derive(Parser)]
#[command(name = "timeline", about = "Command-line client for School Timeline")]
struct Cli {
    /// Base URL of the timeline server
    #[arg(long, env = "TIMELINE_SERVER", default_value = "http://localhost:5000")]
    server: String,

    #[arg(long, env = "TIMELINE_USERNAME")]
    username: String,

    #[arg(long, env = "TIMELINE_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account with the given username and password
    Register,
    /// Show the photo feed
    Feed,
    /// Upload an image file
    Upload {
        file: PathBuf,
        #[arg(long)]
        description: String,
        /// Capture date, `YYYY-MM-DD` or RFC 3339
        #[arg(long)]
        taken_at: Option<String>,
    },
    /// Add a photo that is already hosted elsewhere
    PostUrl {
        url: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        taken_at: Option<String>,
    },
    /// Like a photo
    Like { id: i64 },
    /// Delete one of your photos
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut client = TimelineClient::new(cli.server);

    if let Command::Register = cli.command {
        let user = client.register(&cli.username, &cli.password).await?;
        println!("Registered {} (id {})", user.username, user.id);
        return Ok(());
    }

    client.login(&cli.username, &cli.password).await?;

    match cli.command {
        Command::Register | Command::Feed => {}
        Command::Upload {
            file,
            description,
            taken_at,
        } => {
            let photo = client
                .upload_file(&file, &description, taken_at.as_deref())
                .await?;
            println!("Uploaded photo #{}", photo.id);
        }
        Command::PostUrl {
            url,
            description,
            taken_at,
        } => {
            let photo = client
                .post_photo_url(&url, &description, taken_at.as_deref())
                .await?;
            println!("Added photo #{}", photo.id);
        }
        Command::Like { id } => {
            let photo = client.like(id).await?;
            println!("Photo #{} now has {} likes", photo.id, photo.likes);
        }
        Command::Delete { id } => {
            client.delete(id).await?;
            println!("Deleted photo #{}", id);
        }
    }

    print!("{}", client.render_feed().await?);
    Ok(())
}
