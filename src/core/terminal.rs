use console::{Emoji, style};

use crate::core::config::Config;

pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// Startup summary shown once the listener is bound.
pub fn print_startup(config: &Config, port: u16) {
    println!(
        "\n{} {}",
        ROCKET,
        style(format!("hookd listening on port {}", port))
            .bold()
            .green()
    );
    print_status("Script", &config.script_path.display().to_string());
    print_status("Target ref", &config.target_ref);
    print_link("Trigger", &format!("http://{}/", config.trigger_host));
    print_link("Docs", &format!("http://{}/stable", config.docs.host));
    print_link("Book", &format!("http://{}/stable", config.book.host));
    println!();
}
