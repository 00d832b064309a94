use std::path::Path;

use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    secrecy::Secret,
};

use {
    tgsync_config::{ConfigStore, FileConfigStore},
    tgsync_runtime::{BotTokenAccess, Error, PinPrompt},
};

use crate::console::{TerminalPinPrompt, read_line};

#[derive(Clone, Subcommand)]
pub enum TokenAction {
    /// Seal a new bot token into the configuration file.
    Set,
    /// Seal a plaintext token already in the configuration file.
    Encrypt,
    /// Protect the token with a pin code, or drop the pin with `--clear`.
    Pin {
        #[arg(long)]
        clear: bool,
    },
}

pub async fn handle_token(action: TokenAction, path: &Path) -> Result<()> {
    let store = FileConfigStore::new(path);
    let mut config = store.load().await?;
    let access = BotTokenAccess::default();

    let sealed_with_pin = matches!(access.get_token(&config), Err(Error::PinRequired));
    let needs_current_pin = match action {
        TokenAction::Set => config.encryption_by_pin_code,
        TokenAction::Encrypt => false,
        TokenAction::Pin { .. } => sealed_with_pin,
    };
    if needs_current_pin {
        let pin = TerminalPinPrompt
            .prompt_pin()
            .await
            .context("no pin code entered")?;
        access.set_pin(pin);
        if sealed_with_pin {
            access
                .get_token(&config)
                .context("the pin code does not open the stored bot token")?;
        }
    }

    match action {
        TokenAction::Set => {
            let token = read_line("Bot token: ")?;
            let token = token.trim();
            if token.is_empty() {
                bail!("no bot token entered");
            }
            access.set_token(&mut config, &Secret::new(token.to_string()))?;
        },
        TokenAction::Encrypt => {
            if !access.encrypt_if_needed(&mut config)? {
                eprintln!("Nothing to do: the bot token is already sealed or not set.");
                return Ok(());
            }
        },
        TokenAction::Pin { clear } => {
            let new_pin = if clear {
                None
            } else {
                let pin = read_line("New pin code: ")?;
                let pin = pin.trim();
                if pin.is_empty() {
                    bail!("no pin code entered");
                }
                Some(Secret::new(pin.to_string()))
            };
            access.change_pin(&mut config, new_pin)?;
        },
    }

    store.save(&config).await?;
    eprintln!("Saved {}", path.display());
    Ok(())
}
