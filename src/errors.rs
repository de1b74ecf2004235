use std::path::PathBuf;

use thiserror::Error;

/// Erros possíveis durante a importação e categorização de extratos bancários
#[derive(Error, Debug)]
pub enum StatementError {
    /// A célula âncora não foi encontrada na janela de busca do cabeçalho
    #[error("Unidentifiable headers: anchor '{anchor}' not found in the header search window")]
    HeaderNotFound { anchor: String },

    /// Data fora do formato estrito DD/MM/YYYY (linha relativa aos dados)
    #[error("Invalid date '{value}' in data row {row}, expected DD/MM/YYYY")]
    DateParse { row: usize, value: String },

    /// Valor não numérico; nunca é fatal, a célula vira um valor nulo
    #[error("Invalid amount: '{0}'")]
    AmountParse(String),

    /// Coluna lógica obrigatória ausente após a normalização
    #[error("'{0}' column not found in data")]
    MissingColumn(String),

    /// Extensão de arquivo não suportada pela biblioteca
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Falha de I/O no diretório de extratos salvos (ex.: ao podar arquivos antigos)
    #[error("Statement store I/O error at {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Erro ao ler o conteúdo do arquivo do disco
    #[error("Failed to read file content: {0}")]
    ReadContentFailed(#[from] std::io::Error),

    /// O builder foi chamado sem fornecer conteúdo nem caminho de arquivo
    #[error("Content or filepath is required")]
    MissingContentAndFilepath,

    // ── Erros específicos de formatos ───────────────────────────────────────────

    /// Falha do leitor CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Falha ao abrir ou ler a planilha
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    // ── Configuração ────────────────────────────────────────────────────────────

    /// Arquivo de configuração inválido
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Nenhum perfil configurado para o usuário informado
    #[error("Unknown owner '{0}'")]
    UnknownOwner(String),
}

impl StatementError {
    /// Cria um `StoreIo` a partir de um erro de I/O e do caminho envolvido
    pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.into(),
            source,
        }
    }
}

/// Alias conveniente para Result com nosso tipo de erro principal
pub type StatementResult<T> = Result<T, StatementError>;
