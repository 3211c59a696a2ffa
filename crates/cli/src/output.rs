use crate::error::CliError;
use engine_config::report::summary::JobSummary;

fn render(summary: &JobSummary, json: bool) -> Result<String, CliError> {
    if json {
        Ok(summary.to_json()?)
    } else {
        Ok(summary.to_string())
    }
}

pub fn print_summary(summary: &JobSummary, json: bool) -> Result<(), CliError> {
    println!("{}", render(summary, json)?);
    Ok(())
}
