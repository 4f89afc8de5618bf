use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Index every record of a JSON-lines file
    Sync {
        file: String,
    },

    /// Remove ids from the collection
    Unsync {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print the payload currently indexed for one record
    Show {
        file: String,

        id: String,
    },

    Query {
        file: String,

        text: String,

        #[arg(long, default_value = "10")]
        num: usize,

        /// Metadata filter, e.g. '{"stars": {"$gte": 4}}'
        #[arg(long = "where")]
        where_metadata: Option<String>,

        /// Document filter, e.g. '{"$contains": "rust"}'
        #[arg(long)]
        where_document: Option<String>,
    },

    Count,

    /// Delete the whole collection
    Drop,
}
