use clap::{App, Arg};

const USAGE: &str = "lc3 [image-file1] ...";

#[derive(Debug, PartialEq)]
pub struct Config {
    pub images: Vec<String>,
}

impl Config {
    pub fn parse_from<I, T>(args: I) -> Result<Config, String>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let app = App::new("lc3").usage(USAGE).arg(
            Arg::with_name("IMAGE")
                .help("An LC-3 object file to load.")
                .required(true)
                .multiple(true)
                .index(1),
        );

        let matches = app
            .get_matches_from_safe(args)
            .map_err(|_| USAGE.to_string())?;

        let images = matches
            .values_of("IMAGE")
            .expect("IMAGE is required")
            .map(String::from)
            .collect();

        Ok(Config { images })
    }
}
