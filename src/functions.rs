//! The built-in Excel worksheet-function index table ("Ftab").
//!
//! Maps a function index, as carried by `Func`/`FuncVar` tokens, to its name
//! and, for fixed-arity functions, its argument count. Functions with no
//! listed arity are variable-arity and are only ever encountered via
//! `FuncVar` tokens.
//!
//! Grounded on MS-XLSB 2.5.97.10/.11 `Ftab`; index range kept to the
//! standard worksheet-function set (0x0000-0x01E3). The legacy XLM
//! command/macro range (0x8000+) is out of scope: this reader never
//! executes macros.

/// Index reserved for a user-defined function; its name is carried by the
/// first popped argument rather than this table.
pub const USER_DEFINED_FUNCTION: u16 = 0x00FF;

/// Looks up a function index, returning `(name, fixed_arity)`.
///
/// `fixed_arity` is `None` for variable-arity functions.
pub fn lookup(index: u16) -> Option<(&'static str, Option<u8>)> {
    FTAB.iter().find(|&&(i, _, _)| i == index).map(|&(_, name, arity)| (name, arity))
}

macro_rules! ftab {
    ($(($idx:expr, $name:expr $(, $arity:expr)?),)*) => {
        &[$(($idx, $name, ftab!(@arity $($arity)?))),*]
    };
    (@arity) => { None };
    (@arity $arity:expr) => { Some($arity) };
}

#[rustfmt::skip]
static FTAB: &[(u16, &str, Option<u8>)] = ftab![
    (0x0000, "COUNT"),
    (0x0001, "IF"),
    (0x0002, "ISNA", 1),
    (0x0003, "ISERROR", 1),
    (0x0004, "SUM"),
    (0x0005, "AVERAGE"),
    (0x0006, "MIN"),
    (0x0007, "MAX"),
    (0x0008, "ROW"),
    (0x0009, "COLUMN"),
    (0x000A, "NA"),
    (0x000B, "NPV"),
    (0x000C, "STDEV"),
    (0x000D, "DOLLAR"),
    (0x000E, "FIXED"),
    (0x000F, "SIN", 1),
    (0x0010, "COS", 1),
    (0x0011, "TAN", 1),
    (0x0012, "ATAN", 1),
    (0x0013, "PI"),
    (0x0014, "SQRT", 1),
    (0x0015, "EXP", 1),
    (0x0016, "LN", 1),
    (0x0017, "LOG10", 1),
    (0x0018, "ABS", 1),
    (0x0019, "INT", 1),
    (0x001A, "SIGN", 1),
    (0x001B, "ROUND", 2),
    (0x001C, "LOOKUP"),
    (0x001D, "INDEX"),
    (0x001E, "REPT", 2),
    (0x001F, "MID", 3),
    (0x0020, "LEN", 1),
    (0x0021, "VALUE", 1),
    (0x0022, "TRUE"),
    (0x0023, "FALSE"),
    (0x0024, "AND"),
    (0x0025, "OR"),
    (0x0026, "NOT", 1),
    (0x0027, "MOD", 2),
    (0x0028, "DCOUNT", 3),
    (0x0029, "DSUM", 3),
    (0x002A, "DAVERAGE", 3),
    (0x002B, "DMIN", 3),
    (0x002C, "DMAX", 3),
    (0x002D, "DSTDEV", 3),
    (0x002E, "VAR"),
    (0x002F, "DVAR", 3),
    (0x0030, "TEXT", 2),
    (0x0031, "LINEST"),
    (0x0032, "TREND"),
    (0x0033, "LOGEST"),
    (0x0034, "GROWTH"),
    (0x0035, "GOTO", 1),
    (0x0036, "HALT"),
    (0x0037, "RETURN"),
    (0x0038, "PV"),
    (0x0039, "FV"),
    (0x003A, "NPER"),
    (0x003B, "PMT"),
    (0x003C, "RATE"),
    (0x003D, "MIRR", 3),
    (0x003E, "IRR"),
    (0x003F, "RAND"),
    (0x0040, "MATCH"),
    (0x0041, "DATE", 3),
    (0x0042, "TIME", 3),
    (0x0043, "DAY", 1),
    (0x0044, "MONTH", 1),
    (0x0045, "YEAR", 1),
    (0x0046, "WEEKDAY"),
    (0x0047, "HOUR", 1),
    (0x0048, "MINUTE", 1),
    (0x0049, "SECOND", 1),
    (0x004A, "NOW"),
    (0x004B, "AREAS", 1),
    (0x004C, "ROWS", 1),
    (0x004D, "COLUMNS", 1),
    (0x004E, "OFFSET"),
    (0x004F, "ABSREF", 2),
    (0x0050, "RELREF", 2),
    (0x0051, "ARGUMENT"),
    (0x0052, "SEARCH"),
    (0x0053, "TRANSPOSE", 1),
    (0x0054, "ERROR"),
    (0x0055, "STEP"),
    (0x0056, "TYPE", 1),
    (0x0057, "ECHO"),
    (0x0058, "SET.NAME"),
    (0x0059, "CALLER"),
    (0x005A, "DEREF", 1),
    (0x005B, "WINDOWS"),
    (0x005C, "SERIES"),
    (0x005D, "DOCUMENTS"),
    (0x005E, "ACTIVE.CELL"),
    (0x005F, "SELECTION"),
    (0x0060, "RESULT"),
    (0x0061, "ATAN2", 2),
    (0x0062, "ASIN", 1),
    (0x0063, "ACOS", 1),
    (0x0064, "CHOOSE"),
    (0x0065, "HLOOKUP"),
    (0x0066, "VLOOKUP"),
    (0x0067, "LINKS"),
    (0x0068, "INPUT"),
    (0x0069, "ISREF", 1),
    (0x006A, "GET.FORMULA", 1),
    (0x006B, "GET.NAME"),
    (0x006C, "SET.VALUE", 2),
    (0x006D, "LOG"),
    (0x006E, "EXEC"),
    (0x006F, "CHAR", 1),
    (0x0070, "LOWER", 1),
    (0x0071, "UPPER", 1),
    (0x0072, "PROPER", 1),
    (0x0073, "LEFT"),
    (0x0074, "RIGHT"),
    (0x0075, "EXACT", 2),
    (0x0076, "TRIM", 1),
    (0x0077, "REPLACE", 4),
    (0x0078, "SUBSTITUTE"),
    (0x0079, "CODE", 1),
    (0x007A, "NAMES"),
    (0x007B, "DIRECTORY"),
    (0x007C, "FIND"),
    (0x007D, "CELL"),
    (0x007E, "ISERR", 1),
    (0x007F, "ISTEXT", 1),
    (0x0080, "ISNUMBER", 1),
    (0x0081, "ISBLANK", 1),
    (0x0082, "T", 1),
    (0x0083, "N", 1),
    (0x0084, "FOPEN"),
    (0x0085, "FCLOSE", 1),
    (0x0086, "FSIZE", 1),
    (0x0087, "FREADLN", 1),
    (0x0088, "FREAD", 2),
    (0x0089, "FWRITELN", 2),
    (0x008A, "FWRITE", 2),
    (0x008B, "FPOS"),
    (0x008C, "DATEVALUE", 1),
    (0x008D, "TIMEVALUE", 1),
    (0x008E, "SLN", 3),
    (0x008F, "SYD", 4),
    (0x0090, "DDB"),
    (0x0091, "GET.DEF"),
    (0x0092, "REFTEXT"),
    (0x0093, "TEXTREF"),
    (0x0094, "INDIRECT"),
    (0x0095, "REGISTER"),
    (0x0096, "CALL"),
    (0x0097, "ADD.BAR"),
    (0x0098, "ADD.MENU"),
    (0x0099, "ADD.COMMAND"),
    (0x009A, "ENABLE.COMMAND"),
    (0x009B, "CHECK.COMMAND"),
    (0x009C, "RENAME.COMMAND"),
    (0x009D, "SHOW.BAR"),
    (0x009E, "DELETE.MENU"),
    (0x009F, "DELETE.COMMAND"),
    (0x00A0, "GET.CHART.ITEM"),
    (0x00A1, "DIALOG.BOX", 1),
    (0x00A2, "CLEAN", 1),
    (0x00A3, "MDETERM", 1),
    (0x00A4, "MINVERSE", 1),
    (0x00A5, "MMULT", 2),
    (0x00A6, "FILES"),
    (0x00A7, "IPMT"),
    (0x00A8, "PPMT"),
    (0x00A9, "COUNTA"),
    (0x00AA, "CANCEL.KEY"),
    (0x00AB, "FOR"),
    (0x00AC, "WHILE", 1),
    (0x00AD, "BREAK"),
    (0x00AE, "NEXT"),
    (0x00AF, "INITIATE", 2),
    (0x00B0, "REQUEST", 2),
    (0x00B1, "POKE", 3),
    (0x00B2, "EXECUTE", 2),
    (0x00B3, "TERMINATE", 1),
    (0x00B4, "RESTART"),
    (0x00B5, "HELP"),
    (0x00B6, "GET.BAR"),
    (0x00B7, "PRODUCT"),
    (0x00B8, "FACT", 1),
    (0x00B9, "GET.CELL"),
    (0x00BA, "GET.WORKSPACE", 1),
    (0x00BB, "GET.WINDOW"),
    (0x00BC, "GET.DOCUMENT"),
    (0x00BD, "DPRODUCT", 3),
    (0x00BE, "ISNONTEXT", 1),
    (0x00BF, "GET.NOTE"),
    (0x00C0, "NOTE"),
    (0x00C1, "STDEVP"),
    (0x00C2, "VARP"),
    (0x00C3, "DSTDEVP", 3),
    (0x00C4, "DVARP", 3),
    (0x00C5, "TRUNC"),
    (0x00C6, "ISLOGICAL", 1),
    (0x00C7, "DCOUNTA", 3),
    (0x00C8, "DELETE.BAR", 1),
    (0x00C9, "UNREGISTER", 1),
    (0x00CC, "USDOLLAR"),
    (0x00CD, "FINDB"),
    (0x00CE, "SEARCHB"),
    (0x00CF, "REPLACEB", 4),
    (0x00D0, "LEFTB"),
    (0x00D1, "RIGHTB"),
    (0x00D2, "MIDB", 3),
    (0x00D3, "LENB", 1),
    (0x00D4, "ROUNDUP", 2),
    (0x00D5, "ROUNDDOWN", 2),
    (0x00D6, "ASC", 1),
    (0x00D7, "DBCS", 1),
    (0x00D8, "RANK"),
    (0x00DB, "ADDRESS"),
    (0x00DC, "DAYS360"),
    (0x00DD, "TODAY"),
    (0x00DE, "VDB"),
    (0x00DF, "ELSE"),
    (0x00E0, "ELSE.IF", 1),
    (0x00E1, "END.IF"),
    (0x00E2, "FOR.CELL"),
    (0x00E3, "MEDIAN"),
    (0x00E4, "SUMPRODUCT"),
    (0x00E5, "SINH", 1),
    (0x00E6, "COSH", 1),
    (0x00E7, "TANH", 1),
    (0x00E8, "ASINH", 1),
    (0x00E9, "ACOSH", 1),
    (0x00EA, "ATANH", 1),
    (0x00EB, "DGET", 3),
    (0x00EC, "CREATE.OBJECT"),
    (0x00ED, "VOLATILE"),
    (0x00EE, "LAST.ERROR"),
    (0x00EF, "CUSTOM.UNDO"),
    (0x00F0, "CUSTOM.REPEAT"),
    (0x00F1, "FORMULA.CONVERT"),
    (0x00F2, "GET.LINK.INFO"),
    (0x00F3, "TEXT.BOX"),
    (0x00F4, "INFO", 1),
    (0x00F5, "GROUP"),
    (0x00F6, "GET.OBJECT"),
    (0x00F7, "DB"),
    (0x00F8, "PAUSE"),
    (0x00FB, "RESUME"),
    (0x00FC, "FREQUENCY", 2),
    (0x00FD, "ADD.TOOLBAR"),
    (0x00FE, "DELETE.TOOLBAR", 1),
    (0x00FF, "UserDefinedFunction"),
    (0x0100, "RESET.TOOLBAR", 1),
    (0x0101, "EVALUATE", 1),
    (0x0102, "GET.TOOLBAR"),
    (0x0103, "GET.TOOL"),
    (0x0104, "SPELLING.CHECK"),
    (0x0105, "ERROR.TYPE", 1),
    (0x0106, "APP.TITLE"),
    (0x0107, "WINDOW.TITLE"),
    (0x0108, "SAVE.TOOLBAR"),
    (0x0109, "ENABLE.TOOL", 3),
    (0x010A, "PRESS.TOOL", 3),
    (0x010B, "REGISTER.ID"),
    (0x010C, "GET.WORKBOOK"),
    (0x010D, "AVEDEV"),
    (0x010E, "BETADIST"),
    (0x010F, "GAMMALN", 1),
    (0x0110, "BETAINV"),
    (0x0111, "BINOMDIST", 4),
    (0x0112, "CHIDIST", 2),
    (0x0113, "CHIINV", 2),
    (0x0114, "COMBIN", 2),
    (0x0115, "CONFIDENCE", 3),
    (0x0116, "CRITBINOM", 3),
    (0x0117, "EVEN", 1),
    (0x0118, "EXPONDIST", 3),
    (0x0119, "FDIST", 3),
    (0x011A, "FINV", 3),
    (0x011B, "FISHER", 1),
    (0x011C, "FISHERINV", 1),
    (0x011D, "FLOOR", 2),
    (0x011E, "GAMMADIST", 4),
    (0x011F, "GAMMAINV", 3),
    (0x0120, "CEILING", 2),
    (0x0121, "HYPGEOMDIST", 4),
    (0x0122, "LOGNORMDIST", 3),
    (0x0123, "LOGINV", 3),
    (0x0124, "NEGBINOMDIST", 3),
    (0x0125, "NORMDIST", 4),
    (0x0126, "NORMSDIST", 1),
    (0x0127, "NORMINV", 3),
    (0x0128, "NORMSINV", 1),
    (0x0129, "STANDARDIZE", 3),
    (0x012A, "ODD", 1),
    (0x012B, "PERMUT", 2),
    (0x012C, "POISSON", 3),
    (0x012D, "TDIST", 3),
    (0x012E, "WEIBULL", 4),
    (0x012F, "SUMXMY2", 2),
    (0x0130, "SUMX2MY2", 2),
    (0x0131, "SUMX2PY2", 2),
    (0x0132, "CHITEST", 2),
    (0x0133, "CORREL", 2),
    (0x0134, "COVAR", 2),
    (0x0135, "FORECAST", 3),
    (0x0136, "FTEST", 2),
    (0x0137, "INTERCEPT", 2),
    (0x0138, "PEARSON", 2),
    (0x0139, "RSQ", 2),
    (0x013A, "STEYX", 2),
    (0x013B, "SLOPE", 2),
    (0x013C, "TTEST", 4),
    (0x013D, "PROB"),
    (0x013E, "DEVSQ"),
    (0x013F, "GEOMEAN"),
    (0x0140, "HARMEAN"),
    (0x0141, "SUMSQ"),
    (0x0142, "KURT"),
    (0x0143, "SKEW"),
    (0x0144, "ZTEST"),
    (0x0145, "LARGE", 2),
    (0x0146, "SMALL", 2),
    (0x0147, "QUARTILE", 2),
    (0x0148, "PERCENTILE", 2),
    (0x0149, "PERCENTRANK"),
    (0x014A, "MODE"),
    (0x014B, "TRIMMEAN", 2),
    (0x014C, "TINV", 2),
    (0x014E, "MOVIE.COMMAND"),
    (0x014F, "GET.MOVIE"),
    (0x0150, "CONCATENATE"),
    (0x0151, "POWER", 2),
    (0x0152, "PIVOT.ADD.DATA"),
    (0x0153, "GET.PIVOT.TABLE"),
    (0x0154, "GET.PIVOT.FIELD"),
    (0x0155, "GET.PIVOT.ITEM"),
    (0x0156, "RADIANS", 1),
    (0x0157, "DEGREES", 1),
    (0x0158, "SUBTOTAL"),
    (0x0159, "SUMIF"),
    (0x015A, "COUNTIF", 2),
    (0x015B, "COUNTBLANK", 1),
    (0x015C, "SCENARIO.GET"),
    (0x015D, "OPTIONS.LISTS.GET", 1),
    (0x015E, "ISPMT", 4),
    (0x015F, "DATEDIF", 3),
    (0x0160, "DATESTRING", 1),
    (0x0161, "NUMBERSTRING", 2),
    (0x0162, "ROMAN"),
    (0x0163, "OPEN.DIALOG"),
    (0x0164, "SAVE.DIALOG"),
    (0x0165, "VIEW.GET"),
    (0x0166, "GETPIVOTDATA"),
    (0x0167, "HYPERLINK"),
    (0x0168, "PHONETIC", 1),
    (0x0169, "AVERAGEA"),
    (0x016A, "MAXA"),
    (0x016B, "MINA"),
    (0x016C, "STDEVPA"),
    (0x016D, "VARPA"),
    (0x016E, "STDEVA"),
    (0x016F, "VARA"),
    (0x0170, "BAHTTEXT", 1),
    (0x0171, "THAIDAYOFWEEK", 1),
    (0x0172, "THAIDIGIT", 1),
    (0x0173, "THAIMONTHOFYEAR", 1),
    (0x0174, "THAINUMSOUND", 1),
    (0x0175, "THAINUMSTRING", 1),
    (0x0176, "THAISTRINGLENGTH", 1),
    (0x0177, "ISTHAIDIGIT", 1),
    (0x0178, "ROUNDBAHTDOWN", 1),
    (0x0179, "ROUNDBAHTUP", 1),
    (0x017A, "THAIYEAR", 1),
    (0x017B, "RTD"),
    (0x017C, "CUBEVALUE"),
    (0x017D, "CUBEMEMBER"),
    (0x017E, "CUBEMEMBERPROPERTY", 3),
    (0x017F, "CUBERANKEDMEMBER"),
    (0x0180, "HEX2BIN"),
    (0x0181, "HEX2DEC", 1),
    (0x0182, "HEX2OCT"),
    (0x0183, "DEC2BIN"),
    (0x0184, "DEC2HEX"),
    (0x0185, "DEC2OCT"),
    (0x0186, "OCT2BIN"),
    (0x0187, "OCT2HEX"),
    (0x0188, "OCT2DEC", 1),
    (0x0189, "BIN2DEC", 1),
    (0x018A, "BIN2OCT"),
    (0x018B, "BIN2HEX"),
    (0x018C, "IMSUB", 2),
    (0x018D, "IMDIV", 2),
    (0x018E, "IMPOWER", 2),
    (0x018F, "IMABS", 1),
    (0x0190, "IMSQRT", 1),
    (0x0191, "IMLN", 1),
    (0x0192, "IMLOG2", 1),
    (0x0193, "IMLOG10", 1),
    (0x0194, "IMSIN", 1),
    (0x0195, "IMCOS", 1),
    (0x0196, "IMEXP", 1),
    (0x0197, "IMARGUMENT", 1),
    (0x0198, "IMCONJUGATE", 1),
    (0x0199, "IMAGINARY", 1),
    (0x019A, "IMREAL", 1),
    (0x019B, "COMPLEX"),
    (0x019C, "IMSUM"),
    (0x019D, "IMPRODUCT"),
    (0x019E, "SERIESSUM", 4),
    (0x019F, "FACTDOUBLE", 1),
    (0x01A0, "SQRTPI", 1),
    (0x01A1, "QUOTIENT", 2),
    (0x01A2, "DELTA"),
    (0x01A3, "GESTEP"),
    (0x01A4, "ISEVEN", 1),
    (0x01A5, "ISODD", 1),
    (0x01A6, "MROUND", 2),
    (0x01A7, "ERF"),
    (0x01A8, "ERFC", 1),
    (0x01A9, "BESSELJ", 2),
    (0x01AA, "BESSELK", 2),
    (0x01AB, "BESSELY", 2),
    (0x01AC, "BESSELI", 2),
    (0x01AD, "XIRR"),
    (0x01AE, "XNPV", 3),
    (0x01AF, "PRICEMAT"),
    (0x01B0, "YIELDMAT"),
    (0x01B1, "INTRATE"),
    (0x01B2, "RECEIVED"),
    (0x01B3, "DISC"),
    (0x01B4, "PRICEDISC"),
    (0x01B5, "YIELDDISC"),
    (0x01B6, "TBILLEQ", 3),
    (0x01B7, "TBILLPRICE", 3),
    (0x01B8, "TBILLYIELD", 3),
    (0x01B9, "PRICE"),
    (0x01BA, "YIELD"),
    (0x01BB, "DOLLARDE", 2),
    (0x01BC, "DOLLARFR", 2),
    (0x01BD, "NOMINAL", 2),
    (0x01BE, "EFFECT", 2),
    (0x01BF, "CUMPRINC", 6),
    (0x01C0, "CUMIPMT", 6),
    (0x01C1, "EDATE", 2),
    (0x01C2, "EOMONTH", 2),
    (0x01C3, "YEARFRAC"),
    (0x01C4, "COUPDAYBS"),
    (0x01C5, "COUPDAYS"),
    (0x01C6, "COUPDAYSNC"),
    (0x01C7, "COUPNCD"),
    (0x01C8, "COUPNUM"),
    (0x01C9, "COUPPCD"),
    (0x01CA, "DURATION"),
    (0x01CB, "MDURATION"),
    (0x01CC, "ODDLPRICE"),
    (0x01CD, "ODDLYIELD"),
    (0x01CE, "ODDFPRICE"),
    (0x01CF, "ODDFYIELD"),
    (0x01D0, "RANDBETWEEN", 2),
    (0x01D1, "WEEKNUM"),
    (0x01D2, "AMORDEGRC"),
    (0x01D3, "AMORLINC"),
    (0x01D5, "ACCRINT"),
    (0x01D6, "ACCRINTM"),
    (0x01D7, "WORKDAY"),
    (0x01D8, "NETWORKDAYS"),
    (0x01D9, "GCD"),
    (0x01DA, "MULTINOMIAL"),
    (0x01DB, "LCM"),
    (0x01DC, "FVSCHEDULE", 2),
    (0x01DD, "CUBEKPIMEMBER"),
    (0x01DE, "CUBESET"),
    (0x01DF, "CUBESETCOUNT", 1),
    (0x01E0, "IFERROR", 2),
    (0x01E1, "COUNTIFS"),
    (0x01E2, "SUMIFS"),
    (0x01E3, "AVERAGEIF"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_arity_lookup() {
        assert_eq!(lookup(0x0002), Some(("ISNA", Some(1))));
        assert_eq!(lookup(0x001B), Some(("ROUND", Some(2))));
    }

    #[test]
    fn variable_arity_lookup() {
        assert_eq!(lookup(0x0004), Some(("SUM", None)));
        assert_eq!(lookup(0x0000), Some(("COUNT", None)));
    }

    #[test]
    fn user_defined_function_index() {
        assert_eq!(lookup(USER_DEFINED_FUNCTION), Some(("UserDefinedFunction", None)));
    }

    #[test]
    fn unknown_index() {
        assert_eq!(lookup(0x01E4), None);
        assert_eq!(lookup(0xFFFF), None);
    }
}
