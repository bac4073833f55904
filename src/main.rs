use bookreflow::config::DEFAULT_CONFIG_PATH;
use bookreflow::{
    CalibreConverter, CancelToken, ConversionRecord, ConvertOptions, ConvertRequest, OutputFormat,
    Pipeline, ReadingDirection, ReflowConfig, ReflowError, RequestGuard, Result, ScriptDictionary,
    load_dictionary, output_file_name,
};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// 📚 bookreflow - 电子书横排重排工具
#[derive(Parser)]
#[command(name = "bookreflow")]
#[command(about = "把EPUB/PDF重排为横排EPUB或层级化Markdown，并把简体转换为正体")]
#[command(version)]
struct Args {
    /// 输入文件路径
    #[arg(required_unless_present = "init_config", help = "要处理的EPUB或PDF文件")]
    input: Option<PathBuf>,

    /// 输出路径
    #[arg(short, long, help = "输出文件或目录，默认与输入文件同目录")]
    output: Option<PathBuf>,

    /// 输出格式
    #[arg(short, long, value_enum, default_value = "epub", help = "输出格式")]
    format: FormatArg,

    #[arg(long, help = "行高（1.0 - 3.0）")]
    line_height: Option<f64>,

    #[arg(long, help = "首选字体")]
    font: Option<String>,

    #[arg(long, value_enum, help = "阅读方向")]
    direction: Option<DirectionArg>,

    #[arg(long, help = "只检测简体字，不做转换")]
    no_convert: bool,

    #[arg(long, help = "OpenCC格式的简繁字表文件")]
    dictionary: Option<PathBuf>,

    #[arg(long, help = "配置文件路径")]
    config: Option<PathBuf>,

    #[arg(long, help = "生成默认配置文件后退出")]
    init_config: bool,

    #[arg(long, help = "Markdown输出带YAML前置元数据")]
    front_matter: bool,

    #[arg(long, help = "超时秒数")]
    timeout: Option<u64>,

    /// 详细输出模式
    #[arg(short, long, help = "显示调试日志")]
    verbose: bool,
}

/// 输出格式
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Epub,
    #[value(alias = "md")]
    Markdown,
    /// 需要calibre
    Mobi,
    /// 需要calibre
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Epub => OutputFormat::Epub,
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Mobi => OutputFormat::Mobi,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

/// 阅读方向
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Ltr,
    Rtl,
}

impl From<DirectionArg> for ReadingDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Ltr => ReadingDirection::Ltr,
            DirectionArg::Rtl => ReadingDirection::Rtl,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.init_config {
        let path = args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        return match ReflowConfig::generate_default_config(&path) {
            Ok(()) => {
                println!("✅ 已生成配置文件: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => report_failure(&e),
        };
    }

    match run(&args) {
        Ok((record, path)) => {
            match serde_yml::to_string(&record) {
                Ok(yaml) => print!("{}", yaml),
                Err(e) => log::warn!("无法输出转换记录: {}", e),
            }
            println!("🎉 已输出: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

fn report_failure(error: &ReflowError) -> ExitCode {
    eprintln!("❌ [{}] {}", error.stage(), error);
    ExitCode::FAILURE
}

/// 命令行参数覆盖配置文件
fn load_config(args: &Args) -> Result<ReflowConfig> {
    let mut config = match &args.config {
        Some(path) => ReflowConfig::from_file(path)?,
        None => ReflowConfig::load_or_default(DEFAULT_CONFIG_PATH)?,
    };
    if let Some(line_height) = args.line_height {
        config.line_height = line_height;
    }
    if let Some(font) = &args.font {
        config.font_family = font.clone();
    }
    if let Some(direction) = args.direction {
        config.reading_direction = direction.into();
    }
    if args.no_convert {
        config.convert_simplified = false;
    }
    if let Some(dictionary) = &args.dictionary {
        config.dictionary_path = Some(dictionary.clone());
    }
    if args.front_matter {
        config.front_matter = true;
    }
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(ConversionRecord, PathBuf)> {
    let input_path = args
        .input
        .as_deref()
        .ok_or_else(|| ReflowError::Config("缺少输入文件".to_string()))?;
    let config = load_config(args)?;
    let format = OutputFormat::from(args.format);
    let destination = destination(input_path, args.output.as_deref(), format);

    let (dictionary, warning) = load_dictionary(config.dictionary_path.as_deref());
    let guard = RequestGuard::new(config.timeout(), CancelToken::new());
    let pipeline = Pipeline::new(dictionary.as_deref().map(|d| d as &dyn ScriptDictionary))
        .with_guard(guard)
        .with_warning(warning);

    let input = fs::read(input_path)?;
    let output = pipeline.convert(&ConvertRequest {
        input: &input,
        options: ConvertOptions::from_config(&config, format),
    })?;

    write_output(&output.bytes, &destination, format)?;
    Ok((output.record, destination))
}

/// 输出路径：未指定或指定为目录时使用生成的文件名
fn destination(input: &Path, output: Option<&Path>, format: OutputFormat) -> PathBuf {
    let file_name = output_file_name(input, format);
    match output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .map(|dir| dir.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

/// 先写入目标目录中的临时文件，成功后再改名为目标文件
fn write_output(bytes: &[u8], destination: &Path, format: OutputFormat) -> Result<()> {
    let dir = match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let output_error = |source| ReflowError::Output {
        path: destination.to_path_buf(),
        source,
    };

    let suffix = format!(".{}", format.extension());
    let mut temp = tempfile::Builder::new()
        .prefix(".bookreflow-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(output_error)?;

    if format.is_external() {
        CalibreConverter::new().convert_bytes(bytes, temp.path(), format)?;
    } else {
        temp.write_all(bytes).map_err(output_error)?;
        temp.flush().map_err(output_error)?;
    }

    temp.persist(destination)
        .map_err(|e| output_error(e.error))?;
    Ok(())
}
