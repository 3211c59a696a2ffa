use clap::{Args, Subcommand, ValueEnum};
use engine_config::settings::{DEFAULT_LIMIT, Endpoint, JobSettings, TargetSettings};
use std::{path::PathBuf, time::Duration};

#[derive(Subcommand)]
pub enum Commands {
    /// Move rows from the source table into the target table in batches
    Run(RunArgs),

    /// Pause or resume a running job through its control socket
    Ctl {
        #[arg(long, help = "Control socket of the running job")]
        socket: PathBuf,

        #[arg(value_enum)]
        command: ControlCommand,
    },

    /// Check that a MySQL endpoint is reachable
    TestConn {
        #[arg(long, default_value = "127.0.0.1:3306")]
        address: String,

        #[arg(long, default_value = "root")]
        username: String,

        #[arg(long, default_value = "")]
        password: String,

        #[arg(long)]
        database: String,

        #[arg(long, default_value = "utf8mb4")]
        charset: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControlCommand {
    Pause,
    Resume,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, default_value = "127.0.0.1:3306", help = "Source MySQL address")]
    pub src_address: String,

    #[arg(long, default_value = "root", help = "Source MySQL username")]
    pub src_username: String,

    #[arg(long, default_value = "", help = "Source MySQL password")]
    pub src_password: String,

    #[arg(long, help = "Source MySQL database")]
    pub src_database: String,

    #[arg(long, default_value = "utf8mb4", help = "Source character set")]
    pub src_charset: String,

    #[arg(long, help = "Source table")]
    pub src_table: String,

    #[arg(long, help = "WHERE clause selecting the rows to move; all rows if omitted")]
    pub src_where: Option<String>,

    #[arg(long, default_value_t = DEFAULT_LIMIT, help = "Rows fetched per batch")]
    pub src_limit: usize,

    #[arg(long, default_value = "127.0.0.1:3306", help = "Target MySQL address")]
    pub tgt_address: String,

    #[arg(long, default_value = "root", help = "Target MySQL username")]
    pub tgt_username: String,

    #[arg(long, default_value = "", help = "Target MySQL password")]
    pub tgt_password: String,

    #[arg(long, help = "Target database; defaults to the source database")]
    pub tgt_database: Option<String>,

    #[arg(long, help = "Target character set; defaults to the source character set")]
    pub tgt_charset: Option<String>,

    #[arg(long, help = "Target table; defaults to the source table")]
    pub tgt_table: Option<String>,

    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "5s",
        help = "Progress log interval such as 10s or 1m; 0s disables it"
    )]
    pub progress: Duration,

    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "0s",
        help = "Pause between batches such as 500ms; 0s disables it"
    )]
    pub sleep: Duration,

    #[arg(long, help = "Print statistics when the job ends")]
    pub statistics: bool,

    #[arg(long, default_value_t = 0, help = "Memory growth ceiling in bytes; 0 is unlimited")]
    pub memory: u64,

    #[arg(
        long,
        value_parser = humantime::parse_duration,
        default_value = "0s",
        help = "Stop after this long, between batches, such as 2h30m; 0s runs to completion"
    )]
    pub run_time: Duration,

    #[arg(long, help = "Control socket path; defaults to <tmp>/<address>-<database>-<table>.sock")]
    pub socket: Option<PathBuf>,

    #[arg(long, help = "Do not open a control socket")]
    pub no_control: bool,

    #[arg(long, help = "Print statistics as JSON")]
    pub json: bool,
}

impl RunArgs {
    pub fn into_settings(self) -> JobSettings {
        JobSettings {
            source: Endpoint {
                address: self.src_address,
                username: self.src_username,
                password: self.src_password,
                database: self.src_database,
                charset: self.src_charset,
            },
            source_table: self.src_table,
            filter: self.src_where,
            limit: self.src_limit,
            target: TargetSettings {
                address: self.tgt_address,
                username: self.tgt_username,
                password: self.tgt_password,
                database: self.tgt_database,
                charset: self.tgt_charset,
                table: self.tgt_table,
            },
            progress: self.progress,
            sleep: self.sleep,
            statistics: self.statistics,
            memory_limit: self.memory,
            run_time: self.run_time,
            socket: self.socket,
            control: !self.no_control,
        }
    }
}
