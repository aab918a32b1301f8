use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub product: String,
    pub shop_id: Option<String>,
    pub max_attempts: Option<u32>,
    pub json_logs: bool,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("missing value for argument: {0}")]
    MissingValue(String),
    #[error("--product is required")]
    MissingProduct,
    #[error("invalid --max-attempts value: {0}")]
    InvalidMaxAttempts(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut product = None;
        let mut shop_id = None;
        let mut max_attempts = None;
        let mut json_logs = false;

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(CliError::HelpRequested),
                "--product" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    product = non_empty(value);
                }
                "--shop" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    shop_id = non_empty(value);
                }
                "--max-attempts" => {
                    let value = iter.next().ok_or(CliError::MissingValue(arg.clone()))?;
                    max_attempts = Some(parse_max_attempts(&value)?);
                }
                "--json-logs" => json_logs = true,
                unknown => return Err(CliError::UnknownArgument(unknown.to_string())),
            }
        }

        Ok(Self {
            product: product.ok_or(CliError::MissingProduct)?,
            shop_id,
            max_attempts,
            json_logs,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_max_attempts(value: &str) -> Result<u32, CliError> {
    match value.trim().parse::<u32>() {
        Ok(attempts) if attempts > 0 => Ok(attempts),
        _ => Err(CliError::InvalidMaxAttempts(value.to_string())),
    }
}
