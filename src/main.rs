use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use reqwest::Client;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::signal;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use booru_browse::booru::ImageBooru;
use booru_browse::cli::{Cli, CommandFactory, Parser};
use booru_browse::config::Config;
use booru_browse::error::BooruError;
use booru_browse::offset::resolve;

const SPINNER_FINISH_MODE: ProgressFinish = ProgressFinish::AndClear;
const SPINNER_TICK_SECS: f32 = 0.1;

#[inline]
fn build_spinner() -> ProgressBar {
    ProgressBar::new_spinner()
        .with_finish(SPINNER_FINISH_MODE)
        .with_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .unwrap()
                // For more spinners check out the cli-spinners project:
                // https://github.com/sindresorhus/cli-spinners/blob/master/spinners.json
                // NOTE: use `ascii` only, because cmd/powershell maybe not support unicode.
                .tick_strings(&[".  ", ".. ", "...", " ..", "  .", "   "]),
        )
}

#[inline]
fn build_client(timeout: u64) -> reqwest::Result<Client> {
    let client_builder = Client::builder();
    let client_builder = if timeout > 0 {
        client_builder.timeout(Duration::from_secs(timeout))
    } else {
        client_builder
    };
    client_builder.build()
}

#[inline]
async fn async_main(config: Config) -> anyhow::Result<()> {
    let client = build_client(config.timeout).context("failed to build reqwest client")?;
    let mut booru = ImageBooru::new(client, &config.url);

    let spinner = build_spinner();
    spinner.enable_steady_tick(Duration::from_secs_f32(SPINNER_TICK_SECS));

    if config.post_cap > 0 {
        booru.set_post_cap(config.post_cap);
    } else {
        spinner.set_message(format!("Discovering the post cap of {}...", booru.name()));
        booru
            .discover_post_cap()
            .await
            .context("failed to discover the post cap")?;
    }

    let first = config.offset;
    let last = first.saturating_add(config.num_posts.get() - 1);
    let mut browser = booru.browser(config.tags.iter().cloned());

    let (first_page, _) = resolve(first, booru.post_cap())?;
    let (last_page, _) = resolve(last, booru.post_cap())?;
    spinner.set_message(format!("Fetching pages {first_page}..={last_page}..."));
    if let Err(err) = browser.prefetch(first_page..=last_page).await {
        // every page is fetched again on demand below
        spinner.suspend(|| warn!("Prefetching failed: {err}"));
    }
    spinner.finish_and_clear();

    let transport = booru.transport();
    for offset in first..=last {
        let post = match browser.get_post(offset).await {
            Ok(post) => post,
            Err(BooruError::OutOfRange { .. }) => {
                eprintln!("There is no post at offset {offset}, stopping");
                break;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to get post at offset {offset}"))
            }
        };

        if config.load_images {
            if let Err(err) = post.load_image(transport).await {
                // why `{:#}`: https://docs.rs/anyhow/1.0.86/anyhow/struct.Error.html#display-representations
                eprintln!("{:#}", anyhow::Error::new(err).context(format!("post {}", post.id)));
            }
        }

        let image = post.image.as_ref().map(|image| {
            json!({
                "width": image.width(),
                "height": image.height(),
            })
        });
        println!(
            "{}",
            json!({
                "offset": offset,
                "post": &*post,
                "image": image,
            })
        );
    }

    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    // here, if parse fails, the program will be `abort`ed, and no `Drop` will be called,
    // but it's okay, because we don't need to clean up anything.
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .init();

    let config = match cli.config {
        Some(config) => config,
        None => match Cli::get_config_from_editor(&mut Cli::command()) {
            Ok(config) => config,
            // if we can't get the config from the editor, we drop the whole program.
            Err(err) => {
                let _ = err.print();
                return Ok(ExitCode::from(u8::try_from(err.exit_code()).unwrap()));
            }
        },
    };

    let runtime = Runtime::new().context("failed to build tokio runtime")?;
    runtime.block_on(async {
        tokio::select! {
            result = async_main(config) => {result},
            result = signal::ctrl_c() => {
                result.expect("failed to listen for ctrl-c signal");
                eprintln!("Ctrl-C received, exiting...");
                Ok(())
            },
        }
    })?;

    Ok(ExitCode::SUCCESS)
}
