//! # voicepack CLI
//!
//! Command-line interface for the voicepack library.

use std::process;

use clap::Parser as ClapParser;

use voicepack::VoicepackError;
use voicepack::cli::Args;
use voicepack::config::ConvertConfig;
use voicepack::pipeline::{PipelineContext, RunReport};

fn main() {
    if let Err(e) = run() {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), VoicepackError> {
    let args = <Args as ClapParser>::parse();

    // Print header
    println!("📞 voicepack v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Input:   {}", args.input.display());
    println!("💾 Output:  {}", args.output.display());
    println!("📄 Format:  {}", args.format);
    if let Some(ref number) = args.own_number {
        println!("👤 Self:    {}", number);
    }
    if args.enhanced_filtering {
        println!("🔍 Filter:  Enhanced");
    }
    if args.no_cache {
        println!("🚫 Cache:   Disabled");
    }
    if args.drop_commercial {
        println!("🗑️  Spam:    Dropped");
    }
    println!();

    // Build run configuration
    let mut config = ConvertConfig::new(&args.input, &args.output)
        .with_format(args.format.into())
        .with_enhanced_filtering(args.enhanced_filtering)
        .with_max_open_handles(args.max_handles)
        .with_spill_threshold(args.spill_threshold)
        .with_cache(!args.no_cache)
        .with_cache_max_age_days(args.cache_max_age)
        .with_drop_commercial(args.drop_commercial);
    if let Some(ref number) = args.own_number {
        config = config.with_own_number(number.clone());
    }
    if let Some(ref alias_file) = args.alias_file {
        config = config.with_alias_file(alias_file);
    }

    let context = PipelineContext::new(config)?;

    println!("⏳ Converting export files...");
    let report = context.run()?;

    print_report(&report);
    Ok(())
}

/// Prints skip notices, warnings, the summary block, and performance stats.
fn print_report(report: &RunReport) {
    for skipped in &report.skipped {
        println!("⚠️  Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }

    println!();
    println!("✅ Done! Index saved to {}", report.index_path.display());

    // Summary
    println!();
    println!("📊 Summary:");
    println!(
        "   Files:         {} processed ({} from cache, {} skipped)",
        report.files_processed,
        report.cache_hits,
        report.skipped.len()
    );
    println!("   Conversations: {}", report.conversations);
    if report.commercial > 0 {
        if report.dropped > 0 {
            println!(
                "   Commercial:    {} flagged, {} dropped",
                report.commercial, report.dropped
            );
        } else {
            println!("   Commercial:    {} flagged", report.commercial);
        }
    }
    println!(
        "   Records:       {} ({} sms, {} mms, {} calls, {} voicemails)",
        report.total_records(),
        report.stats.sms,
        report.stats.mms,
        report.stats.calls,
        report.stats.voicemails
    );
    if report.stats.images + report.stats.vcards > 0 {
        println!(
            "   Attachments:   {} images, {} contact cards",
            report.stats.images, report.stats.vcards
        );
    }
    if report.unknown_identities > 0 {
        println!(
            "   Unknown:       {} identities (see unknown_identities.csv)",
            report.unknown_identities
        );
    }

    // Performance stats
    println!();
    println!("⚡ Performance:");
    println!("   Total time:  {:.2}s", report.elapsed.as_secs_f64());
    let records_per_sec = report.total_records() as f64 / report.elapsed.as_secs_f64();
    println!("   Throughput:  {:.0} records/sec", records_per_sec);
}
