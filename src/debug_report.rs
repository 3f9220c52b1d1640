use cubist::{DecodeResult, ExtractMetrics};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_extract(metrics: &ExtractMetrics, merged: usize, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("\n{}", palette.bold(palette.paint("⚙  Extraction", ansi::CYAN)));

    eprintln!("\n{}", palette.paint("━━━ Corpus ━━━", ansi::GRAY));
    eprintln!(
        "  {} {}  {} {}",
        palette.paint("sentences:", ansi::BLUE),
        palette.paint(metrics.sentences.to_string(), ansi::GREEN),
        palette.dim("│ skipped:"),
        if metrics.skipped > 0 {
            palette.paint(metrics.skipped.to_string(), ansi::YELLOW)
        } else {
            palette.dim("0")
        }
    );
    eprintln!("  {} {}", palette.paint("phrases:", ansi::BLUE), metrics.phrases);

    eprintln!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    eprintln!(
        "  generated {}  {} kept {}  {} dropped {}  {} merged {}",
        metrics.generated,
        palette.dim("│"),
        palette.paint(metrics.kept.to_string(), ansi::GREEN),
        palette.dim("│"),
        palette.dim(metrics.dropped().to_string()),
        palette.dim("│"),
        palette.bold(merged.to_string()),
    );

    eprintln!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    eprintln!("  Total: {}", palette.paint(format!("{:?}", metrics.total), ansi::GREEN));
    eprintln!();
}

pub fn print_decode(res: &DecodeResult, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("\n{}", palette.bold(palette.paint(format!("⚙  Decoding: \"{}\"", res.text.trim()), ansi::CYAN)));

    eprintln!("\n{}", palette.paint("━━━ Chart ━━━", ansi::GRAY));
    for pass in &res.metrics.passes {
        eprintln!(
            "  {} {}  {} {}  {} {}  {}",
            palette.paint(format!("len {}:", pass.span_len), ansi::BLUE),
            if pass.filled_cells > 0 {
                palette.paint(format!("✓ {} cells", pass.filled_cells), ansi::GREEN)
            } else {
                palette.dim("✗ 0 cells")
            },
            palette.dim("options:"),
            palette.paint(format!("{}/{}", pass.options_admitted, pass.options_seen), ansi::YELLOW),
            palette.dim("pops:"),
            palette.paint(pass.pops.to_string(), ansi::YELLOW),
            palette.dim(format!("{:?}", pass.duration)),
        );
    }

    eprintln!("\n{}", palette.paint("━━━ Results ━━━", ansi::GRAY));
    if res.nbest.is_empty() {
        eprintln!("{}", palette.dim("  No derivation covers the whole sentence"));
        eprintln!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        eprintln!("  • Glue rules are disabled and no rule spans the sentence");
        eprintln!("  • rule_limit or beam_size pruned every complete derivation");
    } else {
        for (idx, (text, score)) in res.nbest.iter().take(5).enumerate() {
            eprintln!(
                "  {} {} {} {}",
                palette.paint(format!("[{}]", idx), ansi::GRAY),
                palette.bold(palette.paint(text, ansi::GREEN)),
                palette.dim("│"),
                palette.paint(format!("{score:.4}"), ansi::YELLOW),
            );
        }
        if res.nbest.len() > 5 {
            eprintln!("    {}", palette.dim(format!("... +{} more", res.nbest.len() - 5)));
        }
    }

    eprintln!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    eprintln!(
        "  Total: {}  │  Pops: {}",
        palette.paint(format!("{:?}", res.metrics.total), ansi::GREEN),
        palette.paint(res.metrics.pops().to_string(), ansi::CYAN),
    );
    eprintln!();
}
